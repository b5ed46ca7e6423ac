//! Adapter configuration.
//!
//! ```
//! use std::time::Duration;
//! use tandem_grpc::GrpcClientConfig;
//!
//! let config = GrpcClientConfig::builder("127.0.0.1:9000")
//!     .insecure(true)
//!     .timeout(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.endpoint_uri(), "http://127.0.0.1:9000");
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tandem_core::{default_recovery_handler, RecoveryHandler};
use tandem_middleware::Middleware;

use crate::status::{default_error_decoder, default_error_encoder, ErrorDecoder, ErrorEncoder};
use crate::GrpcError;

/// Default gRPC listen address.
pub const DEFAULT_GRPC_ADDR: &str = "0.0.0.0:9000";

/// Default per-call client timeout.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

/// gRPC server adapter configuration.
#[derive(Clone)]
pub struct GrpcServerConfig {
    addr: String,
    middleware: Vec<Arc<dyn Middleware>>,
    error_encoder: ErrorEncoder,
    recovery: RecoveryHandler,
}

impl GrpcServerConfig {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> GrpcServerConfigBuilder {
        GrpcServerConfigBuilder::default()
    }

    /// Returns the listen address.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, GrpcError> {
        self.addr.parse().map_err(|source| GrpcError::InvalidAddr {
            addr: self.addr.clone(),
            source,
        })
    }

    /// Returns the global middleware, outermost first.
    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// Returns the error encoder.
    #[must_use]
    pub fn error_encoder(&self) -> &ErrorEncoder {
        &self.error_encoder
    }

    /// Returns the recovery handler.
    #[must_use]
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_GRPC_ADDR.to_string(),
            middleware: Vec::new(),
            error_encoder: default_error_encoder(),
            recovery: default_recovery_handler(),
        }
    }
}

impl fmt::Debug for GrpcServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcServerConfig")
            .field("addr", &self.addr)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`GrpcServerConfig`].
#[derive(Default)]
pub struct GrpcServerConfigBuilder {
    config: GrpcServerConfig,
}

impl GrpcServerConfigBuilder {
    /// Sets the listen address.
    #[must_use]
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Sets the global middleware, outermost first.
    #[must_use]
    pub fn middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.config.middleware = middleware;
        self
    }

    /// Replaces the error encoder.
    #[must_use]
    pub fn error_encoder(mut self, encoder: ErrorEncoder) -> Self {
        self.config.error_encoder = encoder;
        self
    }

    /// Replaces the recovery handler.
    #[must_use]
    pub fn recovery_handler(mut self, recovery: RecoveryHandler) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<GrpcServerConfig, GrpcError> {
        self.config.socket_addr()?;
        Ok(self.config)
    }
}

/// gRPC client adapter configuration.
#[derive(Clone)]
pub struct GrpcClientConfig {
    target: String,
    insecure: bool,
    timeout: Duration,
    interceptors: Vec<Arc<dyn Middleware>>,
    error_decoder: ErrorDecoder,
    recovery: RecoveryHandler,
}

impl GrpcClientConfig {
    /// Creates a builder for `target`, e.g. `"127.0.0.1:9000"` or
    /// `"https://api.example.com"`.
    #[must_use]
    pub fn builder(target: impl Into<String>) -> GrpcClientConfigBuilder {
        GrpcClientConfigBuilder {
            config: Self {
                target: target.into(),
                insecure: false,
                timeout: DEFAULT_CLIENT_TIMEOUT,
                interceptors: Vec::new(),
                error_decoder: default_error_decoder(),
                recovery: default_recovery_handler(),
            },
        }
    }

    /// Returns the configured target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns `true` when TLS is disabled.
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the user interceptors, outermost first.
    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Middleware>] {
        &self.interceptors
    }

    /// Returns the error decoder.
    #[must_use]
    pub fn error_decoder(&self) -> &ErrorDecoder {
        &self.error_decoder
    }

    /// Returns the recovery handler.
    #[must_use]
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }

    /// Returns the target as a URI, adding `http://` or `https://` when the
    /// target has no scheme.
    #[must_use]
    pub fn endpoint_uri(&self) -> String {
        if self.target.contains("://") {
            self.target.clone()
        } else if self.insecure {
            format!("http://{}", self.target)
        } else {
            format!("https://{}", self.target)
        }
    }
}

impl fmt::Debug for GrpcClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcClientConfig")
            .field("target", &self.target)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`GrpcClientConfig`].
pub struct GrpcClientConfigBuilder {
    config: GrpcClientConfig,
}

impl GrpcClientConfigBuilder {
    /// Disables TLS.
    #[must_use]
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.config.insecure = insecure;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Appends a user interceptor. Interceptors run in the order added.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Middleware>) -> Self {
        self.config.interceptors.push(interceptor);
        self
    }

    /// Replaces the error decoder.
    #[must_use]
    pub fn error_decoder(mut self, decoder: ErrorDecoder) -> Self {
        self.config.error_decoder = decoder;
        self
    }

    /// Replaces the recovery handler.
    #[must_use]
    pub fn recovery_handler(mut self, recovery: RecoveryHandler) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<GrpcClientConfig, GrpcError> {
        if self.config.target.trim().is_empty() {
            return Err(GrpcError::InvalidConfig("target must not be empty".into()));
        }
        if self.config.timeout.is_zero() {
            return Err(GrpcError::InvalidConfig("timeout must be positive".into()));
        }
        Ok(self.config)
    }
}
