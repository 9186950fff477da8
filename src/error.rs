//! Error types for callgate.
//!
//! Failures of the throttled tasks themselves never appear here: `execute`
//! hands back whatever the task produced.

use thiserror::Error;

/// Main error type for callgate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// A limit policy that cannot be enforced (zero limit or zero window)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration or rule file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for GateError {
    fn from(err: ::config::ConfigError) -> Self {
        GateError::Config(err.to_string())
    }
}

/// Result type alias for callgate operations.
pub type Result<T> = std::result::Result<T, GateError>;
