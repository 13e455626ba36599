//! Session tokens and the sign-in/sign-out lifecycle.
//!
//! A session starts anonymous. A successful credential check produces a
//! signed token; while the token verifies the session is authenticated.
//! Expiry or sign-out returns it to anonymous.

mod token;

pub use token::{SessionClaims, SessionIssuer};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::UserIdentity;

/// Session token settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret used to sign tokens
    pub secret: String,
    /// Token lifetime in seconds
    pub max_age_secs: u64,
    /// Age in seconds after which a token is re-issued
    pub update_age_secs: u64,
    /// Use the `__Secure-` cookie name
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            max_age_secs: 30 * 24 * 60 * 60,
            update_age_secs: 24 * 60 * 60,
            secure_cookies: false,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "[redacted]" })
            .field("max_age_secs", &self.max_age_secs)
            .field("update_age_secs", &self.update_age_secs)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl SessionConfig {
    /// Check that both ages fit a signed duration. The secret is checked
    /// when a [`SessionIssuer`] is built.
    pub fn validate(&self) -> crate::error::Result<()> {
        token::seconds_setting("session.max_age_secs", self.max_age_secs)?;
        token::seconds_setting("session.update_age_secs", self.update_age_secs)?;
        Ok(())
    }
}

/// Whether a request carries a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(SessionClaims),
}

impl SessionState {
    /// Whether the token verified.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Claims of an authenticated session.
    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            SessionState::Authenticated(claims) => Some(claims),
            SessionState::Anonymous => None,
        }
    }
}

/// Log a completed sign-in.
pub fn record_sign_in(identity: &UserIdentity, provider: &str) {
    info!(
        user_id = %identity.id,
        email = %identity.email,
        provider = %provider,
        "User signed in"
    );
}

/// Log a sign-out.
pub fn record_sign_out(state: &SessionState) {
    match state.claims() {
        Some(claims) => info!(user_id = %claims.sub, "User signed out"),
        None => info!("Anonymous session signed out"),
    }
}
