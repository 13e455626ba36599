//! Signed session tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SessionConfig, SessionState};
use crate::auth::{Role, UserIdentity};
use crate::error::{LiftlogError, Result};

/// Cookie name prefix used when cookies are marked secure.
const SECURE_COOKIE_PREFIX: &str = "__Secure-";

/// Base name of the session cookie.
const COOKIE_NAME: &str = "liftlog.session-token";

/// Claims carried in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    /// `iat` as a timestamp, or `None` if out of range.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

/// Issues and reads HS256 session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
    update_age: Duration,
    secure_cookies: bool,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("max_age", &self.max_age)
            .field("update_age", &self.update_age)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Build an issuer. Fails if the secret is empty, the max age is zero, or
    /// either age does not fit a signed duration.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(LiftlogError::Config(
                "session.secret must be set to issue or read session tokens".to_string(),
            ));
        }
        if config.max_age_secs == 0 {
            return Err(LiftlogError::Config(
                "session.max_age_secs must be greater than 0".to_string(),
            ));
        }

        let secret = config.secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            max_age: seconds_setting("session.max_age_secs", config.max_age_secs)?,
            update_age: seconds_setting("session.update_age_secs", config.update_age_secs)?,
            secure_cookies: config.secure_cookies,
        })
    }

    /// Issue a token for a freshly signed-in user.
    pub fn issue(&self, identity: &UserIdentity) -> Result<String> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token as if signed in at `now`.
    pub fn issue_at(&self, identity: &UserIdentity, now: DateTime<Utc>) -> Result<String> {
        let claims = SessionClaims {
            sub: identity.id.to_string(),
            role: identity.role,
            name: identity.name.clone(),
            email: identity.email.clone(),
            iat: 0,
            exp: 0,
        };
        self.sign(claims, now)
    }

    /// Read a token. Anything that does not verify is an anonymous session.
    pub fn read(&self, token: &str) -> SessionState {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => SessionState::Authenticated(data.claims),
            Err(e) => {
                debug!(error = %e, "Session token rejected");
                SessionState::Anonymous
            }
        }
    }

    /// The logged-in signal consumed by the route guard.
    pub fn is_logged_in(&self, token: Option<&str>) -> bool {
        token
            .map(|t| self.read(t).is_authenticated())
            .unwrap_or(false)
    }

    /// Re-issue the token if it is older than the update age.
    pub fn refresh_if_stale(&self, claims: &SessionClaims) -> Result<Option<String>> {
        self.refresh_if_stale_at(claims, Utc::now())
    }

    /// Like [`SessionIssuer::refresh_if_stale`], measured against `now`.
    pub fn refresh_if_stale_at(
        &self,
        claims: &SessionClaims,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if now.timestamp().saturating_sub(claims.iat) < self.update_age.num_seconds() {
            return Ok(None);
        }
        debug!(sub = %claims.sub, "Refreshing session token");
        self.sign(claims.clone(), now).map(Some)
    }

    /// Re-issue the token with a changed name or email. The role is kept.
    pub fn update_profile(
        &self,
        claims: &SessionClaims,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<String> {
        let mut updated = claims.clone();
        if let Some(name) = name {
            updated.name = Some(name);
        }
        if let Some(email) = email {
            updated.email = email;
        }
        self.sign(updated, Utc::now())
    }

    /// Name of the cookie the token travels in.
    pub fn cookie_name(&self) -> String {
        if self.secure_cookies {
            format!("{}{}", SECURE_COOKIE_PREFIX, COOKIE_NAME)
        } else {
            COOKIE_NAME.to_string()
        }
    }

    /// Lifetime of an issued token.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn sign(&self, mut claims: SessionClaims, now: DateTime<Utc>) -> Result<String> {
        let expires = now.checked_add_signed(self.max_age).ok_or_else(|| {
            LiftlogError::Config(format!(
                "session.max_age_secs of {}s runs past the latest representable time",
                self.max_age.num_seconds()
            ))
        })?;
        claims.iat = now.timestamp();
        claims.exp = expires.timestamp();
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }
}

/// Convert a seconds setting into a duration, rejecting values it cannot hold.
pub(super) fn seconds_setting(name: &str, secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| LiftlogError::Config(format!("{} of {} is out of range", name, secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "test-secret-with-enough-entropy".to_string(),
            ..SessionConfig::default()
        }
    }

    fn identity() -> UserIdentity {
        UserIdentity {
            id: uuid::Uuid::new_v4(),
            name: Some("Jane".to_string()),
            email: "jane@example.com".to_string(),
            role: Role::Admin,
            image: None,
            email_verified: None,
        }
    }

    fn claims_of(state: SessionState) -> SessionClaims {
        match state {
            SessionState::Authenticated(claims) => claims,
            SessionState::Anonymous => panic!("expected an authenticated session"),
        }
    }

    #[test]
    fn test_issue_and_read() {
        let issuer = SessionIssuer::new(&config()).unwrap();
        let user = identity();
        let token = issuer.issue(&user).unwrap();

        let claims = claims_of(issuer.read(&token));
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
        assert!(issuer.is_logged_in(Some(&token)));
    }

    #[test]
    fn test_missing_or_tampered_token_is_anonymous() {
        let issuer = SessionIssuer::new(&config()).unwrap();
        let token = issuer.issue(&identity()).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(issuer.read(&tampered), SessionState::Anonymous);
        assert_eq!(issuer.read("not.a.token"), SessionState::Anonymous);
        assert!(!issuer.is_logged_in(None));

        let other = SessionIssuer::new(&SessionConfig {
            secret: "another-secret".to_string(),
            ..SessionConfig::default()
        })
        .unwrap();
        assert_eq!(other.read(&token), SessionState::Anonymous);
    }

    #[test]
    fn test_expired_token_is_anonymous() {
        let issuer = SessionIssuer::new(&config()).unwrap();
        let token = issuer
            .issue_at(&identity(), Utc::now() - Duration::days(31))
            .unwrap();
        assert_eq!(issuer.read(&token), SessionState::Anonymous);
    }

    #[test]
    fn test_refresh_only_when_stale() {
        let issuer = SessionIssuer::new(&config()).unwrap();
        let issued = Utc::now() - Duration::hours(2);
        let claims = claims_of(issuer.read(&issuer.issue_at(&identity(), issued).unwrap()));

        assert!(issuer.refresh_if_stale(&claims).unwrap().is_none());

        let later = issued + Duration::hours(25);
        let refreshed = issuer.refresh_if_stale_at(&claims, later).unwrap().unwrap();
        let refreshed = claims_of(issuer.read(&refreshed));
        assert_eq!(refreshed.iat, later.timestamp());
        assert_eq!(refreshed.sub, claims.sub);
    }

    #[test]
    fn test_update_profile_keeps_role() {
        let issuer = SessionIssuer::new(&config()).unwrap();
        let claims = claims_of(issuer.read(&issuer.issue(&identity()).unwrap()));

        let token = issuer
            .update_profile(&claims, Some("Janet".to_string()), None)
            .unwrap();
        let updated = claims_of(issuer.read(&token));
        assert_eq!(updated.name.as_deref(), Some("Janet"));
        assert_eq!(updated.email, "jane@example.com");
        assert_eq!(updated.role, Role::Admin);
    }

    #[test]
    fn test_cookie_names() {
        let plain = SessionIssuer::new(&config()).unwrap();
        assert_eq!(plain.cookie_name(), "liftlog.session-token");

        let secure = SessionIssuer::new(&SessionConfig {
            secure_cookies: true,
            ..config()
        })
        .unwrap();
        assert_eq!(secure.cookie_name(), "__Secure-liftlog.session-token");
    }

    #[test]
    fn test_out_of_range_ages_rejected() {
        let huge = SessionConfig {
            max_age_secs: u64::MAX,
            ..config()
        };
        assert!(matches!(SessionIssuer::new(&huge), Err(LiftlogError::Config(_))));

        let huge_update = SessionConfig {
            update_age_secs: u64::MAX,
            ..config()
        };
        assert!(matches!(SessionIssuer::new(&huge_update), Err(LiftlogError::Config(_))));
    }

    #[test]
    fn test_expiry_past_calendar_limit_is_an_error() {
        let issuer = SessionIssuer::new(&SessionConfig {
            max_age_secs: 9_000_000_000_000,
            ..config()
        })
        .unwrap();
        assert!(matches!(issuer.issue(&identity()), Err(LiftlogError::Config(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SessionIssuer::new(&SessionConfig::default()).is_err());
    }
}
