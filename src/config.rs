//! Configuration management for Liftlog auth.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::PasswordConfig;
use crate::error::{LiftlogError, Result};
use crate::guard::RouteConfig;
use crate::ratelimit::RateLimitingConfig;
use crate::session::SessionConfig;

/// Prefix of environment variable overrides, e.g. `LIFTLOG__SESSION__SECRET`.
const ENV_PREFIX: &str = "LIFTLOG";

/// Separator between the prefix and nested keys in environment overrides.
const ENV_SEPARATOR: &str = "__";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiftlogConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Session token configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Route guard configuration
    #[serde(default)]
    pub routes: RouteConfig,

    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LiftlogConfig {
    /// Load configuration from defaults, an optional YAML file, then
    /// `LIFTLOG__*` environment variables, later sources winning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: LiftlogConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file only.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: LiftlogConfig = serde_yaml::from_str(&contents)
            .map_err(|e| LiftlogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the limiters, sessions or the hasher cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.validate()?;
        self.session.validate()?;
        self.password.validate()?;
        Ok(())
    }
}
