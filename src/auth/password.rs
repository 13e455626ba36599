//! Adaptive password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::error::{LiftlogError, Result};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordConfig {
    /// Reject cost parameters argon2 would refuse.
    pub fn validate(&self) -> Result<()> {
        self.params().map(|_| ())
    }

    fn params(&self) -> Result<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| LiftlogError::Config(format!("Invalid password hashing parameters: {}", e)))
    }
}

/// Produces and checks salted password hashes.
pub trait CredentialHasher: Send + Sync + std::fmt::Debug {
    /// Hash a plaintext password with a fresh salt.
    fn hash(&self, password: &str) -> Result<String>;

    /// Whether `password` matches `hash`. A hash that cannot be parsed never matches.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher. Hashes are self-describing PHC strings, so existing
/// hashes keep verifying after the cost parameters change.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    config: PasswordConfig,
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("config", &self.config)
            .finish()
    }
}

impl Argon2Hasher {
    /// Build a hasher. Fails on invalid cost parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = config.params()?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            config: *config,
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| LiftlogError::PasswordHash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .ok()
            .map(|parsed| self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }
}

/// A deliberately cheap hasher for tests.
#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(&PasswordConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash("Str0ng!pw").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Str0ng!pw", &hash));
        assert!(!hasher.verify("str0ng!pw", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = test_hasher();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_garbage_hash_never_matches() {
        let hasher = test_hasher();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn test_verify_across_parameter_changes() {
        let hash = test_hasher().hash("Str0ng!pw").unwrap();
        let stronger = Argon2Hasher::new(&PasswordConfig {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.verify("Str0ng!pw", &hash));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let config = PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(config.validate().is_err());
        assert!(Argon2Hasher::new(&config).is_err());
        assert!(PasswordConfig::default().validate().is_ok());
    }
}
