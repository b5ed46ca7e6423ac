//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading, validating or converting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The file or string is not a format the loader understands.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// TOML did not parse or had unknown fields.
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON did not parse or had unknown fields.
    #[error("failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be applied.
    #[error("failed to parse environment variable {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A value failed validation.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field, e.g. `http_server.addr`.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::env("TANDEM__HTTP_CLIENT__TIMEOUT_MS", "expected integer");
        assert!(err.to_string().contains("TANDEM__HTTP_CLIENT__TIMEOUT_MS"));

        let err = ConfigError::invalid("http_server.addr", "not a socket address");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for http_server.addr: not a socket address"
        );
    }
}
