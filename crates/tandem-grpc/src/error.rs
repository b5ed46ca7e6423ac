//! Adapter construction errors.

use thiserror::Error;

/// Failure while configuring or starting a gRPC adapter.
#[derive(Debug, Error)]
pub enum GrpcError {
    /// A configuration value is out of range.
    #[error("invalid grpc config: {0}")]
    InvalidConfig(String),

    /// The bind address could not be parsed.
    #[error("invalid listen address {addr}: {source}")]
    InvalidAddr {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Channel or server transport failure.
    #[error("grpc transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
