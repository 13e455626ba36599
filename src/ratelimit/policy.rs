//! Fixed-window limiter policies and their configuration.
//!
//! A policy is the pair the limiter is constructed with: how long a window
//! lasts and how many requests it admits. The two policies the application
//! needs (sign-in and registration) are the defaults of
//! [`RateLimitingConfig`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Sign-in window: 15 minutes.
const LOGIN_WINDOW_MS: u64 = 15 * 60 * 1000;
/// Sign-in attempts per window.
const LOGIN_MAX_REQUESTS: u32 = 5;
/// Registration window: 1 hour.
const REGISTER_WINDOW_MS: u64 = 60 * 60 * 1000;
/// Registration attempts per window.
const REGISTER_MAX_REQUESTS: u32 = 3;
/// How often expired records are swept.
const SWEEP_INTERVAL_MS: u64 = 60 * 1000;

/// Errors raised when a policy cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The window duration must be greater than zero
    #[error("window duration must be greater than 0")]
    ZeroWindow,
    /// At least one request must be admitted per window
    #[error("max_requests must be greater than 0")]
    ZeroMaxRequests,
    /// The sweep interval must be greater than zero
    #[error("sweep interval must be greater than 0")]
    ZeroSweepInterval,
    /// The periodic sweep needs a running tokio runtime
    #[error("no tokio runtime is running to drive the sweep")]
    NoRuntime,
}

/// A fixed-window policy: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// Window duration in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window
    pub max_requests: u32,
}

impl WindowPolicy {
    /// Create a validated policy.
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, PolicyError> {
        let policy = Self {
            window_ms: window.as_millis() as u64,
            max_requests,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// 5 attempts per 15 minutes.
    pub fn login() -> Self {
        Self {
            window_ms: LOGIN_WINDOW_MS,
            max_requests: LOGIN_MAX_REQUESTS,
        }
    }

    /// 3 attempts per hour.
    pub fn register() -> Self {
        Self {
            window_ms: REGISTER_WINDOW_MS,
            max_requests: REGISTER_MAX_REQUESTS,
        }
    }

    /// The window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Check the policy is usable.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.window_ms == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if self.max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests);
        }
        Ok(())
    }
}

/// Rate limiting section of the service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Interval between sweeps of expired records, in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Policy applied per origin and email on sign-in
    #[serde(default = "WindowPolicy::login")]
    pub login: WindowPolicy,

    /// Policy applied per origin on registration
    #[serde(default = "WindowPolicy::register")]
    pub register: WindowPolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval(),
            login: WindowPolicy::login(),
            register: WindowPolicy::register(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    SWEEP_INTERVAL_MS
}

impl RateLimitingConfig {
    /// The sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Validate every policy and the sweep interval.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.sweep_interval_ms == 0 {
            return Err(PolicyError::ZeroSweepInterval);
        }
        self.login.validate()?;
        self.register.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = RateLimitingConfig::default();
        assert_eq!(config.login.window(), Duration::from_secs(900));
        assert_eq!(config.login.max_requests, 5);
        assert_eq!(config.register.window(), Duration::from_secs(3600));
        assert_eq!(config.register.max_requests, 3);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_rejects_zero_values() {
        assert_eq!(
            WindowPolicy::new(Duration::ZERO, 5),
            Err(PolicyError::ZeroWindow)
        );
        assert_eq!(
            WindowPolicy::new(Duration::from_secs(1), 0),
            Err(PolicyError::ZeroMaxRequests)
        );
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = RateLimitingConfig {
            sweep_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(PolicyError::ZeroSweepInterval));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
login:
  window_ms: 60000
  max_requests: 10
"#;
        let config: RateLimitingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.login.max_requests, 10);
        assert_eq!(config.login.window(), Duration::from_secs(60));
        // Unspecified sections keep their defaults
        assert_eq!(config.register, WindowPolicy::register());
        assert_eq!(config.sweep_interval_ms, 60_000);
    }
}
