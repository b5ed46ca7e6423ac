//! Telemetry errors.

use thiserror::Error;

/// Failure while installing the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level or filter directive did not parse.
    #[error("invalid log filter {filter:?}: {message}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::LoggingInit("already set".into());
        assert_eq!(err.to_string(), "failed to initialize logging: already set");
    }
}
