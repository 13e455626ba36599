//! Error types for the Liftlog auth core.

use thiserror::Error;

/// Main error type for crate-level operations (startup, configuration, tokens).
///
/// Request-level outcomes have their own enums: [`crate::auth::AuthError`]
/// for sign-in and [`crate::auth::RegisterError`] for registration.
#[derive(Error, Debug)]
pub enum LiftlogError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid rate limit policy
    #[error("Rate limit policy error: {0}")]
    Policy(#[from] crate::ratelimit::PolicyError),

    /// Session token encoding/decoding errors
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Password hashing errors
    #[error("Password processing failed: {0}")]
    PasswordHash(String),

    /// User store errors
    #[error("User store error: {0}")]
    Store(#[from] crate::auth::StoreError),

    /// YAML (de)serialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for LiftlogError {
    fn from(err: config::ConfigError) -> Self {
        LiftlogError::Config(err.to_string())
    }
}

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, LiftlogError>;
