//! Adapter configuration.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tandem_core::{default_recovery_handler, RecoveryHandler};
use tandem_middleware::Middleware;

use crate::client::{check_response, ErrorDecoder};
use crate::codec::{
    decode_request, error_encoder, response_encoder, ErrorEncoder, Negotiation, RequestDecoder,
    ResponseEncoder,
};
use crate::HttpError;

/// Default HTTP listen address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Default per-call client timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default idle keep-alive for pooled client connections.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default number of idle pooled client connections per host.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 100;

/// Default time the server waits for open connections on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on a request body, in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// HTTP server adapter configuration.
#[derive(Clone)]
pub struct HttpServerConfig {
    addr: String,
    shutdown_timeout: Duration,
    max_body_size: usize,
    negotiation: Negotiation,
    middleware: Vec<Arc<dyn Middleware>>,
    request_decoder: RequestDecoder,
    response_encoder: ResponseEncoder,
    error_encoder: ErrorEncoder,
    recovery: RecoveryHandler,
}

impl HttpServerConfig {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> HttpServerConfigBuilder {
        HttpServerConfigBuilder::default()
    }

    /// Returns the listen address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, HttpError> {
        self.addr.parse().map_err(|source| HttpError::InvalidAddr {
            addr: self.addr.clone(),
            source,
        })
    }

    /// Returns how long shutdown waits for open connections.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the largest request body the server reads, in bytes.
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Returns the response negotiation strategy.
    pub fn negotiation(&self) -> Negotiation {
        self.negotiation
    }

    /// Returns the global middleware, outermost first.
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// Returns the request decoder.
    pub fn request_decoder(&self) -> &RequestDecoder {
        &self.request_decoder
    }

    /// Returns the response encoder.
    pub fn response_encoder(&self) -> &ResponseEncoder {
        &self.response_encoder
    }

    /// Returns the error encoder.
    pub fn error_encoder(&self) -> &ErrorEncoder {
        &self.error_encoder
    }

    /// Returns the recovery handler.
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        let negotiation = Negotiation::default();
        Self {
            addr: DEFAULT_HTTP_ADDR.to_string(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            negotiation,
            middleware: Vec::new(),
            request_decoder: Arc::new(decode_request),
            response_encoder: response_encoder(negotiation),
            error_encoder: error_encoder(negotiation),
            recovery: default_recovery_handler(),
        }
    }
}

impl fmt::Debug for HttpServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerConfig")
            .field("addr", &self.addr)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("max_body_size", &self.max_body_size)
            .field("negotiation", &self.negotiation)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpServerConfig`].
#[derive(Default)]
pub struct HttpServerConfigBuilder {
    config: HttpServerConfig,
    custom_response_encoder: bool,
    custom_error_encoder: bool,
}

impl HttpServerConfigBuilder {
    /// Sets the listen address.
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Sets how long shutdown waits for open connections.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Caps the request body size; larger bodies are rejected unread.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Sets the response negotiation strategy used by the default encoders.
    pub fn negotiation(mut self, negotiation: Negotiation) -> Self {
        self.config.negotiation = negotiation;
        self
    }

    /// Sets the global middleware, outermost first.
    pub fn middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.config.middleware = middleware;
        self
    }

    /// Replaces the request decoder.
    pub fn request_decoder(mut self, decoder: RequestDecoder) -> Self {
        self.config.request_decoder = decoder;
        self
    }

    /// Replaces the response encoder.
    pub fn response_encoder(mut self, encoder: ResponseEncoder) -> Self {
        self.config.response_encoder = encoder;
        self.custom_response_encoder = true;
        self
    }

    /// Replaces the error encoder.
    pub fn error_encoder(mut self, encoder: ErrorEncoder) -> Self {
        self.config.error_encoder = encoder;
        self.custom_error_encoder = true;
        self
    }

    /// Replaces the recovery handler.
    pub fn recovery_handler(mut self, recovery: RecoveryHandler) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(mut self) -> Result<HttpServerConfig, HttpError> {
        self.config.socket_addr()?;
        let negotiation = self.config.negotiation;
        if !self.custom_response_encoder {
            self.config.response_encoder = response_encoder(negotiation);
        }
        if !self.custom_error_encoder {
            self.config.error_encoder = error_encoder(negotiation);
        }
        Ok(self.config)
    }
}

/// HTTP client adapter configuration.
#[derive(Clone)]
pub struct HttpClientConfig {
    timeout: Duration,
    keep_alive: Duration,
    max_idle_conns: usize,
    user_agent: Option<String>,
    content_type: String,
    middleware: Vec<Arc<dyn Middleware>>,
    error_decoder: ErrorDecoder,
    recovery: RecoveryHandler,
}

impl HttpClientConfig {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the idle keep-alive for pooled connections.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the idle connection limit per host.
    pub fn max_idle_conns(&self) -> usize {
        self.max_idle_conns
    }

    /// Returns the user agent override.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns the content type used to encode typed requests.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the middleware wrapped around typed calls, outermost first.
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// Returns the error decoder.
    pub fn error_decoder(&self) -> &ErrorDecoder {
        &self.error_decoder
    }

    /// Returns the recovery handler.
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            user_agent: None,
            content_type: "application/json".to_string(),
            middleware: Vec::new(),
            error_decoder: Arc::new(check_response),
            recovery: default_recovery_handler(),
        }
    }
}

impl fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("timeout", &self.timeout)
            .field("keep_alive", &self.keep_alive)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("user_agent", &self.user_agent)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpClientConfig`].
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the idle keep-alive for pooled connections.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Sets the idle connection limit per host.
    pub fn max_idle_conns(mut self, max: usize) -> Self {
        self.config.max_idle_conns = max;
        self
    }

    /// Overrides the user agent sent when a request carries none.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the content type used to encode typed requests.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.config.content_type = content_type.into();
        self
    }

    /// Appends middleware around typed calls. Middleware runs in the order added.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.config.middleware.push(middleware);
        self
    }

    /// Replaces the error decoder.
    pub fn error_decoder(mut self, decoder: ErrorDecoder) -> Self {
        self.config.error_decoder = decoder;
        self
    }

    /// Replaces the recovery handler.
    pub fn recovery_handler(mut self, recovery: RecoveryHandler) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<HttpClientConfig, HttpError> {
        if self.config.timeout.is_zero() {
            return Err(HttpError::InvalidConfig("timeout must be positive".into()));
        }
        if tandem_encoding::content_subtype(&self.config.content_type).is_none() {
            return Err(HttpError::InvalidConfig(format!(
                "content type {:?} has no subtype",
                self.config.content_type
            )));
        }
        Ok(self.config)
    }
}
