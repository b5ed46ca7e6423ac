//! # Tandem Telemetry
//!
//! Installs the process-wide `tracing` subscriber. The adapters only emit
//! events through the `tracing` macros; which events reach which output is
//! decided here.
//!
//! ```no_run
//! use tandem_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging");
//! tracing::info!(transport = "HTTP", operation = "GET /v1/books", "ready");
//! ```

mod error;
pub mod fields;
mod logging;

pub use error::TelemetryError;
pub use logging::{env_filter, init_logging, LogConfig, LogFormat};
