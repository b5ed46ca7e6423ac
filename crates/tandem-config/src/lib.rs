//! Layered configuration for tandem services.
//!
//! A [`TandemConfig`] carries one section per adapter plus logging. The
//! [`ConfigLoader`] builds it from defaults, TOML or JSON files and
//! `PREFIX__SECTION__KEY` environment variables, then validates every
//! section by building the adapter configuration it describes.
//!
//! ```toml
//! [http_server]
//! addr = "0.0.0.0:8080"
//! negotiation = "accept"
//!
//! [grpc_client]
//! target = "grpc://catalog.internal:9000?isSecure=true"
//! timeout_ms = 2000
//!
//! [logging]
//! level = "tandem_http=debug,info"
//! format = "compact"
//! ```

mod config;
mod error;
mod loader;
mod settings;

pub use config::TandemConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    GrpcClientSettings, GrpcServerSettings, HttpClientSettings, HttpServerSettings,
    NegotiationMode,
};
