//! Registry errors.

use tandem_core::StatusError;
use thiserror::Error;

/// Failure from a registrar, discovery backend or watcher.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An endpoint URI could not be parsed.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending URI.
        endpoint: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A required instance field is empty.
    #[error("service instance is missing {0}")]
    MissingField(&'static str),

    /// The watcher was closed.
    #[error("watcher closed")]
    Closed,

    /// The watch deadline elapsed before any change.
    #[error("watch deadline exceeded")]
    DeadlineExceeded,

    /// Backend-specific failure.
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl From<RegistryError> for StatusError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::InvalidEndpoint { .. } | RegistryError::MissingField(_) => {
                Self::invalid_argument("InvalidServiceInstance", message)
            }
            RegistryError::Closed => Self::canceled("WatcherClosed", message),
            RegistryError::DeadlineExceeded => Self::deadline_exceeded("DeadlineExceeded", message),
            RegistryError::Backend(_) => Self::unavailable("RegistryUnavailable", message),
        }
    }
}
