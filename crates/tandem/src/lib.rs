//! # Tandem
//!
//! **One handler, two transports.**
//!
//! Tandem lets the same typed handler and middleware serve gRPC (over
//! `tonic`) and HTTP (over `hyper`), and call either from a client with one
//! error model:
//!
//! - [`StatusError`] carries a canonical [`Code`], a reason and metadata, and
//!   maps losslessly onto gRPC status details and HTTP JSON bodies.
//! - Codecs are looked up by content type in a process-wide registry
//!   ([`encoding::global`]).
//! - Middleware wraps handlers in registration order, globally or per
//!   service, and runs under panic recovery.
//! - [`CallContext`] tells handlers which transport they serve and exposes
//!   the adapter's request details.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tandem::prelude::*;
//! use tandem::http::Method;
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize)]
//! struct Ping { seq: u64 }
//!
//! async fn ping(_ctx: CallContext, req: Ping) -> StatusResult<Ping> {
//!     Ok(Ping { seq: req.seq + 1 })
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("tandem.toml")?
//!         .with_env_prefix("TANDEM")
//!         .load()?;
//!     tandem::telemetry::init_logging(&config.logging)?;
//!
//!     let mut server = HttpServer::new(config.http_server.to_config()?);
//!     server.register(
//!         ServiceDesc::new("health.v1.Ping").method(MethodDesc::new(Method::POST, "/v1/ping", ping)),
//!     );
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/tandem/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use tandem_core as core;
pub use tandem_core::{CallContext, Code, StatusError, StatusResult};

pub use tandem_encoding as encoding;

pub use tandem_middleware as middleware;

pub use tandem_grpc as grpc;

/// HTTP adapters, plus the `http` method and header types they take.
pub mod http {
    pub use tandem_http::*;

    pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
}

pub use tandem_registry as registry;

pub use tandem_telemetry as telemetry;

pub use tandem_config as config;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tandem_core::{
        CallContext, Code, RequestId, ServiceId, StatusError, StatusResult, TransportKind,
    };

    pub use tandem_encoding::{Codec, Message, Proto};

    pub use tandem_middleware::{FnMiddleware, Handler, LoggingMiddleware, Middleware, Next};

    pub use tandem_grpc::{GrpcClient, GrpcServer, GrpcServerInfo};

    pub use tandem_http::{HttpClient, HttpServer, HttpServerInfo, MethodDesc, ServiceDesc};

    pub use tandem_registry::{Discovery, Endpoint, Registrar, ServiceInstance, Watcher};

    pub use tandem_config::{ConfigLoader, TandemConfig};
}
