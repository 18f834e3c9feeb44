//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
}

/// Errors raised by semantic validation of loaded configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ValidationError {
    /// Creates a validation error for a field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
