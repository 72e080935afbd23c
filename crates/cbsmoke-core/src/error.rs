//! Error types for cbsmoke-core

use thiserror::Error;

/// Result type alias using cbsmoke-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for cbsmoke
#[derive(Error, Debug)]
pub enum Error {
    /// Runtime configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection string could not be parsed
    #[error("Invalid connection string '{input}': {reason}")]
    InvalidConnectionString { input: String, reason: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid connection string error
    pub fn invalid_connection_string(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConnectionString {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}
