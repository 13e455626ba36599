//! Credential verification and account registration.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::error::{AuthError, RegisterError};
use super::origin::ClientOrigin;
use super::password::CredentialHasher;
use super::schema::{normalize_email, validate_login, validate_registration, Credentials, RegisterForm};
use super::store::{StoreError, UserStore};
use super::user::{NewUser, RegisteredUser, UserIdentity};
use crate::ratelimit::{Limiters, RateLimitKey};

/// Checks credentials and creates accounts.
///
/// Holds the user store, the password hasher and the two limiters. Cheap to
/// clone; clones share the same limiters.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    limiters: Limiters,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("hasher", &self.hasher)
            .field("limiters", &self.limiters)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Wire an authenticator to its store, hasher and limiters.
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        limiters: Limiters,
    ) -> Self {
        Self {
            store,
            hasher,
            limiters,
        }
    }

    /// The login and registration limiters.
    pub fn limiters(&self) -> &Limiters {
        &self.limiters
    }

    /// Verify a sign-in attempt.
    ///
    /// Returns the user's identity on success. Failures come in three
    /// classes only: malformed input, rate limited, and invalid credentials.
    /// Unknown email, missing password hash, wrong password and internal
    /// failures all surface as [`AuthError::InvalidCredentials`].
    #[instrument(skip_all, fields(origin = %origin))]
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        origin: &ClientOrigin,
    ) -> Result<UserIdentity, AuthError> {
        let form = match validate_login(credentials) {
            Ok(form) => form,
            Err(errors) => {
                debug!(fields = ?errors.fields(), "Malformed sign-in attempt");
                return Err(AuthError::MalformedCredentials);
            }
        };

        let key = RateLimitKey::login(origin.as_str(), &form.email).to_identifier();
        if !self.limiters.login.check(&key) {
            warn!(key = %key, "Sign-in rate limit exceeded");
            return Err(AuthError::RateLimited {
                retry_after: self.limiters.login.retry_after(&key),
            });
        }

        let email = normalize_email(&form.email);
        let user = match self.store.find_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!(email = %email, "Sign-in for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(email = %email, error = %e, "User lookup failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let Some(hash) = user.password_hash.clone() else {
            info!(email = %email, "Sign-in for account without a password");
            return Err(AuthError::InvalidCredentials);
        };

        let hasher = Arc::clone(&self.hasher);
        let password = form.password;
        let verified =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await;

        match verified {
            Ok(true) => {
                debug!(email = %email, user_id = %user.id, "Credentials verified");
                Ok(UserIdentity::from(&user))
            }
            Ok(false) => {
                info!(email = %email, "Wrong password");
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => {
                error!(email = %email, error = %e, "Password verification task failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Create an account from a registration form.
    #[instrument(skip_all, fields(origin = %origin))]
    pub async fn register(
        &self,
        form: &RegisterForm,
        origin: &ClientOrigin,
    ) -> Result<RegisteredUser, RegisterError> {
        let key = RateLimitKey::register(origin.as_str()).to_identifier();
        if !self.limiters.register.check(&key) {
            warn!(key = %key, "Registration rate limit exceeded");
            return Err(RegisterError::RateLimited {
                retry_after: self.limiters.register.retry_after(&key),
            });
        }

        if let Err(errors) = validate_registration(form) {
            debug!(fields = ?errors.fields(), "Registration failed validation");
            return Err(RegisterError::Validation(errors));
        }

        let email = normalize_email(&form.email);
        match self.store.find_by_email(&email).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                info!(email = %email, "Registration for existing email");
                return Err(RegisterError::EmailTaken);
            }
            Err(e) => {
                error!(email = %email, error = %e, "User lookup failed");
                return Err(RegisterError::Internal);
            }
        }

        let hasher = Arc::clone(&self.hasher);
        let password = form.password.clone();
        let password_hash = match tokio::task::spawn_blocking(move || hasher.hash(&password)).await
        {
            Ok(Ok(hash)) => hash,
            Ok(Err(e)) => {
                error!(error = %e, "Password hashing failed");
                return Err(RegisterError::Internal);
            }
            Err(e) => {
                error!(error = %e, "Password hashing task failed");
                return Err(RegisterError::Internal);
            }
        };

        let new_user = NewUser {
            name: form.name.trim().to_string(),
            email: email.clone(),
            password_hash,
        };

        match self.store.create(new_user).await {
            Ok(user) => {
                info!(email = %email, user_id = %user.id, "User registered");
                Ok(RegisteredUser::from(&user))
            }
            Err(StoreError::Duplicate(_)) => {
                info!(email = %email, "Email registered concurrently");
                Err(RegisterError::EmailTaken)
            }
            Err(e) => {
                error!(email = %email, error = %e, "User creation failed");
                Err(RegisterError::Internal)
            }
        }
    }
}
