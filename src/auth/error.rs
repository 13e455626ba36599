//! Authentication and registration outcomes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// An empty set of field errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Whether no field has failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the fields that failed, for logging.
    pub fn fields(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Messages recorded for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let name = field.to_string();
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                fields.add(&name, message);
            }
        }
        fields
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Outcome of a failed credential check.
///
/// There are exactly three classes. `InvalidCredentials` covers an unknown
/// email, an account without a password and a wrong password alike, so a
/// caller cannot tell which accounts exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Input did not have the shape of an email/password pair
    #[error("Invalid email or password format.")]
    MalformedCredentials,

    /// Too many attempts for this origin and email
    #[error("Too many login attempts. Please try again later.")]
    RateLimited { retry_after: Option<Duration> },

    /// Anything else: unknown user, no password set, wrong password, internal failure
    #[error("Invalid credentials.")]
    InvalidCredentials,
}

impl AuthError {
    /// Text safe to show to the person signing in.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// HTTP status the request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedCredentials => 400,
            AuthError::RateLimited { .. } => 429,
            AuthError::InvalidCredentials => 401,
        }
    }

    /// Whole seconds a client should wait before retrying, if rate limited.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after: Some(wait),
            } => Some(wait.as_secs() + u64::from(wait.subsec_nanos() > 0)),
            _ => None,
        }
    }
}

/// Outcome of a failed registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Too many registrations from this origin
    #[error("Too many registration attempts. Please try again later.")]
    RateLimited { retry_after: Option<Duration> },

    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The normalized email is already registered
    #[error("A user with this email already exists")]
    EmailTaken,

    /// Hashing or storage failed
    #[error("Internal server error")]
    Internal,
}

impl RegisterError {
    /// HTTP status the request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RegisterError::RateLimited { .. } => 429,
            RegisterError::Validation(_) => 400,
            RegisterError::EmailTaken => 409,
            RegisterError::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::MalformedCredentials.user_message(),
            "Invalid email or password format."
        );
        assert_eq!(
            AuthError::RateLimited { retry_after: None }.user_message(),
            "Too many login attempts. Please try again later."
        );
        assert_eq!(AuthError::InvalidCredentials.user_message(), "Invalid credentials.");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MalformedCredentials.status_code(), 400);
        assert_eq!(AuthError::RateLimited { retry_after: None }.status_code(), 429);
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(RegisterError::EmailTaken.status_code(), 409);
        assert_eq!(RegisterError::Validation(FieldErrors::new()).status_code(), 400);
        assert_eq!(RegisterError::Internal.status_code(), 500);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = AuthError::RateLimited {
            retry_after: Some(Duration::from_millis(1500)),
        };
        assert_eq!(err.retry_after_secs(), Some(2));
        assert_eq!(AuthError::InvalidCredentials.retry_after_secs(), None);
    }

    #[test]
    fn test_field_errors_collect_and_display() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("password", "too short");
        errors.add("password", "needs a digit");
        errors.add("email", "Invalid email address");

        assert_eq!(errors.fields(), vec!["email", "password"]);
        assert_eq!(errors.get("password").unwrap().len(), 2);
        assert_eq!(
            errors.to_string(),
            "email: Invalid email address; password: too short, needs a digit"
        );

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["email"][0], "Invalid email address");
    }
}
