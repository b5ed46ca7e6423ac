//! # Tandem HTTP
//!
//! HTTP adapters for tandem.
//!
//! - [`HttpServer`] routes requests from a declarative [`ServiceDesc`] table,
//!   negotiates codecs, runs the global and per-service middleware chains
//!   under panic recovery, and writes status errors with a mapped HTTP status
//!   and a codec-encoded body. It serves connections with `hyper`.
//! - [`HttpClient`] wraps a [`RoundTrip`] (by default a pooled `reqwest`
//!   client) with user-agent injection, a per-call timeout, panic recovery and
//!   status-error decoding.
//!
//! ## Example
//!
//! ```no_run
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//! use tandem_core::{CallContext, StatusError};
//! use tandem_http::{HttpServer, HttpServerConfig, MethodDesc, ServiceDesc};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Hello { name: String }
//!
//! async fn hello(_ctx: CallContext, req: Hello) -> Result<Hello, StatusError> {
//!     Ok(Hello { name: format!("hello {}", req.name) })
//! }
//!
//! # async fn run() -> Result<(), tandem_http::HttpError> {
//! let mut server = HttpServer::new(HttpServerConfig::builder().addr("127.0.0.1:8000").build()?);
//! server.register(
//!     ServiceDesc::new("greeter.v1.Greeter").method(MethodDesc::new(Method::POST, "/v1/hello", hello)),
//! );
//! server.run().await
//! # }
//! ```

mod client;
mod codec;
mod config;
mod error;
mod router;
mod server;
mod shutdown;

pub use client::{
    check_response, decode_response, ErrorDecoder, HttpClient, ReqwestTransport, RoundTrip,
    DEFAULT_USER_AGENT,
};
pub use codec::{
    decode_request, error_encoder, response_encoder, ErrorEncoder, HttpResponse, Negotiation,
    RequestDecoder, ResponseEncoder,
};
pub use config::{
    HttpClientConfig, HttpClientConfigBuilder, HttpServerConfig, HttpServerConfigBuilder,
    DEFAULT_HTTP_ADDR, DEFAULT_KEEP_ALIVE, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_IDLE_CONNS,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use error::HttpError;
pub use server::{HttpServer, HttpServerInfo, MethodDesc, RawHandler, ServiceDesc};
pub use shutdown::ShutdownSignal;
