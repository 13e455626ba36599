//! Input shapes for sign-in and registration, and their validation rules.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use validator::Validate;

use super::error::FieldErrors;

/// Characters that count as "special" in a password.
const PASSWORD_SPECIALS: &str = "@$!%*?&";

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z\s'-]+$").unwrap();
}

/// Lower-case and trim an email. Two emails that differ only in case or
/// surrounding whitespace name the same account.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A submitted email/password pair. Never persisted.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Credentials as submitted, before normalization.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Validated sign-in shape.
#[derive(Debug, Validate)]
pub(crate) struct LoginForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Check a sign-in submission: a well-formed email and a non-empty password.
pub(crate) fn validate_login(credentials: &Credentials) -> Result<LoginForm, FieldErrors> {
    let form = LoginForm {
        email: credentials.email.trim().to_string(),
        password: credentials.password.clone(),
    };
    form.validate().map_err(FieldErrors::from)?;
    Ok(form)
}

/// A registration submission.
#[derive(Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub confirm_password: String,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Check every registration field, collecting all failures.
pub fn validate_registration(form: &RegisterForm) -> Result<(), FieldErrors> {
    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };

    let name_len = form.name.chars().count();
    if name_len < NAME_MIN_CHARS {
        errors.add("name", "Name must be at least 2 characters");
    }
    if name_len > NAME_MAX_CHARS {
        errors.add("name", "Name must be less than 100 characters");
    }
    if !NAME_REGEX.is_match(&form.name) {
        errors.add(
            "name",
            "Name can only contain letters, spaces, hyphens, and apostrophes",
        );
    }

    if !password_is_complex(&form.password) {
        errors.add(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        );
    }

    if form.password != form.confirm_password {
        errors.add("confirmPassword", "Password don't match");
    }

    errors.into_result()
}

/// Lower, upper, digit and special character all present, and the password
/// starts with one of the allowed characters.
fn password_is_complex(password: &str) -> bool {
    let is_special = |c: char| PASSWORD_SPECIALS.contains(c);

    let starts_allowed = password
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric() || is_special(c))
        .unwrap_or(false);

    starts_allowed
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(is_special)
}
