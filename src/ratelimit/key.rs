//! Rate limit key construction.

use crate::auth::normalize_email;

/// Discriminator appended to the origin for registration attempts.
const REGISTER_SUFFIX: &str = "register";

/// A key that identifies one throttled subject.
///
/// The key is the client's network origin joined with an operation or
/// account discriminator, so the same origin is counted separately per
/// account on sign-in and once overall on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// Network origin of the request
    pub origin: String,
    /// Operation or account discriminator
    pub discriminator: String,
}

impl RateLimitKey {
    /// Key for a sign-in attempt: origin plus the normalized email.
    pub fn login(origin: &str, email: &str) -> Self {
        Self {
            origin: origin.to_string(),
            discriminator: normalize_email(email),
        }
    }

    /// Key for a registration attempt: origin only.
    pub fn register(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            discriminator: REGISTER_SUFFIX.to_string(),
        }
    }

    /// The identifier string handed to the limiter.
    pub fn to_identifier(&self) -> String {
        format!("{}-{}", self.origin, self.discriminator)
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_key() {
        let key = RateLimitKey::register("1.2.3.4");
        assert_eq!(key.to_identifier(), "1.2.3.4-register");
    }

    #[test]
    fn test_login_key_normalizes_email() {
        let key = RateLimitKey::login("10.0.0.1", "  Jane.Doe@Example.COM ");
        assert_eq!(key.to_string(), "10.0.0.1-jane.doe@example.com");
    }

    #[test]
    fn test_login_keys_equal_across_email_case() {
        let key1 = RateLimitKey::login("10.0.0.1", "jane@example.com");
        let key2 = RateLimitKey::login("10.0.0.1", "JANE@example.com");
        assert_eq!(key1, key2);

        let other_origin = RateLimitKey::login("10.0.0.2", "jane@example.com");
        assert_ne!(key1, other_origin);
    }
}
