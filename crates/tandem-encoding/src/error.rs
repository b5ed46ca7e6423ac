//! Codec errors.

use tandem_core::StatusError;
use thiserror::Error;

/// Failure while marshaling or unmarshaling a message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("{codec}: marshal failed: {message}")]
    Marshal {
        /// Codec name.
        codec: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// The bytes could not be parsed into the target.
    #[error("{codec}: unmarshal failed: {message}")]
    Unmarshal {
        /// Codec name.
        codec: &'static str,
        /// Underlying failure.
        message: String,
    },

    /// The message has no representation in this codec's format.
    #[error("{codec}: unsupported message type {type_name}")]
    Unsupported {
        /// Codec name.
        codec: &'static str,
        /// Rust type name of the message.
        type_name: &'static str,
    },
}

impl CodecError {
    /// Creates a marshal error.
    pub fn marshal(codec: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Marshal {
            codec,
            message: err.to_string(),
        }
    }

    /// Creates an unmarshal error.
    pub fn unmarshal(codec: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unmarshal {
            codec,
            message: err.to_string(),
        }
    }
}

/// Unmarshal failures are the caller's fault; everything else is internal.
impl From<CodecError> for StatusError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Unmarshal { .. } => {
                StatusError::invalid_argument("CodecUnmarshal", err.to_string())
            }
            CodecError::Marshal { .. } | CodecError::Unsupported { .. } => {
                StatusError::internal("CodecMarshal", err.to_string())
            }
        }
    }
}
