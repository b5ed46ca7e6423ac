//! Adapter construction and serving errors.

use thiserror::Error;

/// Failure while configuring, binding or running an HTTP adapter.
#[derive(Debug, Error)]
pub enum HttpError {
    /// A configuration value is out of range.
    #[error("invalid http config: {0}")]
    InvalidConfig(String),

    /// The listen address could not be parsed.
    #[error("invalid listen address {addr}: {source}")]
    InvalidAddr {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was tried.
        addr: std::net::SocketAddr,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The client transport could not be built.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
