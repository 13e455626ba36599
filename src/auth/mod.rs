//! Credential checks, registration and the user model.

mod authenticator;
mod error;
mod origin;
mod password;
mod schema;
mod store;
mod user;

pub use authenticator::Authenticator;
pub use error::{AuthError, FieldErrors, RegisterError};
pub use origin::ClientOrigin;
pub use password::{Argon2Hasher, CredentialHasher, PasswordConfig};
pub use schema::{normalize_email, validate_registration, Credentials, RegisterForm};
pub use store::{MemoryUserStore, StoreError, UserStore};
pub use user::{NewUser, RegisteredUser, Role, UserIdentity, UserRecord};
