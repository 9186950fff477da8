//! Configuration management for callgate.

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::Result;
use crate::throttle::{LimitPolicy, LimitRules};

/// Prefix for environment variable overrides, e.g. `CALLGATE_LIMITER__LIMIT=30`.
pub const ENV_PREFIX: &str = "CALLGATE";

/// Main configuration for callgate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Whether calls are throttled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Policy for the default limiter
    #[serde(default)]
    pub limiter: LimitPolicy,

    /// Path to per-key limit rules
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            limiter: LimitPolicy::default(),
            rules_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `callgate=debug`
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

impl AppConfig {
    /// Load configuration from an optional file, then environment overrides.
    ///
    /// A missing file is not an error; every absent field takes its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                warn!(path = %path.display(), "Configuration file not found, using defaults");
            }
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.limiter.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path, ignoring the environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: AppConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.limiter.validate()?;
        Ok(config)
    }

    /// Per-key rules: from `rules_path` if set, otherwise just the default policy.
    pub fn rules(&self) -> Result<LimitRules> {
        match &self.rules_path {
            Some(path) => LimitRules::from_file(path),
            None => Ok(LimitRules::new(self.limiter)),
        }
    }
}
