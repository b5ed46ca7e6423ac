//! Per-adapter settings sections.
//!
//! Each section deserializes from the file and converts into the adapter's
//! builder, so code can still attach middleware and hooks before `build()`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_grpc::{GrpcClientConfig, GrpcClientConfigBuilder, GrpcServerConfig, GrpcServerConfigBuilder};
use tandem_http::{
    HttpClientConfig, HttpClientConfigBuilder, HttpServerConfig, HttpServerConfigBuilder,
    Negotiation,
};
use tandem_registry::Endpoint;

use crate::ConfigError;

/// How the HTTP server picks the response codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationMode {
    /// Reply in the request's content type.
    #[default]
    Mirror,
    /// Honor the `Accept` header.
    Accept,
}

impl From<NegotiationMode> for Negotiation {
    fn from(mode: NegotiationMode) -> Self {
        match mode {
            NegotiationMode::Mirror => Self::MirrorRequest,
            NegotiationMode::Accept => Self::AcceptHeader,
        }
    }
}

/// `[http_server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpServerSettings {
    /// Listen address.
    pub addr: String,
    /// Grace period for open connections on shutdown.
    pub shutdown_timeout_ms: u64,
    /// Largest request body read, in bytes.
    pub max_body_size: usize,
    /// Response codec selection.
    pub negotiation: NegotiationMode,
}

impl Default for HttpServerSettings {
    fn default() -> Self {
        Self {
            addr: tandem_http::DEFAULT_HTTP_ADDR.to_string(),
            shutdown_timeout_ms: millis(tandem_http::DEFAULT_SHUTDOWN_TIMEOUT),
            max_body_size: tandem_http::DEFAULT_MAX_BODY_SIZE,
            negotiation: NegotiationMode::default(),
        }
    }
}

impl HttpServerSettings {
    /// Returns a builder preloaded with these settings.
    pub fn builder(&self) -> HttpServerConfigBuilder {
        HttpServerConfig::builder()
            .addr(&self.addr)
            .shutdown_timeout(Duration::from_millis(self.shutdown_timeout_ms))
            .max_body_size(self.max_body_size)
            .negotiation(self.negotiation.into())
    }

    /// Builds the server configuration.
    pub fn to_config(&self) -> Result<HttpServerConfig, ConfigError> {
        self.builder()
            .build()
            .map_err(|e| ConfigError::invalid("http_server", e))
    }
}

/// `[http_client]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientSettings {
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Idle keep-alive of pooled connections.
    pub keep_alive_secs: u64,
    /// Idle pooled connections per host.
    pub max_idle_conns: usize,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Content type for typed requests.
    pub content_type: String,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            timeout_ms: millis(tandem_http::DEFAULT_TIMEOUT),
            keep_alive_secs: tandem_http::DEFAULT_KEEP_ALIVE.as_secs(),
            max_idle_conns: tandem_http::DEFAULT_MAX_IDLE_CONNS,
            user_agent: None,
            content_type: "application/json".to_string(),
        }
    }
}

impl HttpClientSettings {
    /// Returns a builder preloaded with these settings.
    pub fn builder(&self) -> HttpClientConfigBuilder {
        let builder = HttpClientConfig::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .keep_alive(Duration::from_secs(self.keep_alive_secs))
            .max_idle_conns(self.max_idle_conns)
            .content_type(&self.content_type);
        match &self.user_agent {
            Some(agent) => builder.user_agent(agent),
            None => builder,
        }
    }

    /// Builds the client configuration.
    pub fn to_config(&self) -> Result<HttpClientConfig, ConfigError> {
        self.builder()
            .build()
            .map_err(|e| ConfigError::invalid("http_client", e))
    }
}

/// `[grpc_server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrpcServerSettings {
    /// Listen address.
    pub addr: String,
}

impl Default for GrpcServerSettings {
    fn default() -> Self {
        Self {
            addr: tandem_grpc::DEFAULT_GRPC_ADDR.to_string(),
        }
    }
}

impl GrpcServerSettings {
    /// Returns a builder preloaded with these settings.
    pub fn builder(&self) -> GrpcServerConfigBuilder {
        GrpcServerConfig::builder().addr(&self.addr)
    }

    /// Builds the server configuration.
    pub fn to_config(&self) -> Result<GrpcServerConfig, ConfigError> {
        self.builder()
            .build()
            .map_err(|e| ConfigError::invalid("grpc_server", e))
    }
}

/// `[grpc_client]` section.
///
/// `target` is either `host:port` or an endpoint URI such as
/// `grpc://10.0.0.7:9000?isSecure=false`; the URI's `isSecure` flag, when
/// present, overrides `insecure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrpcClientSettings {
    /// Dial target.
    pub target: String,
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Use plaintext instead of TLS.
    pub insecure: bool,
}

impl Default for GrpcClientSettings {
    fn default() -> Self {
        Self {
            target: String::new(),
            timeout_ms: millis(tandem_grpc::DEFAULT_CLIENT_TIMEOUT),
            insecure: false,
        }
    }
}

impl GrpcClientSettings {
    /// Returns a builder preloaded with these settings.
    pub fn builder(&self) -> Result<GrpcClientConfigBuilder, ConfigError> {
        let (target, insecure) = if self.target.contains("://") {
            let endpoint = Endpoint::parse(&self.target)
                .map_err(|e| ConfigError::invalid("grpc_client.target", e))?;
            let secure = endpoint.is_secure().unwrap_or(!self.insecure);
            (endpoint.authority(), !secure)
        } else {
            (self.target.clone(), self.insecure)
        };
        Ok(GrpcClientConfig::builder(target)
            .timeout(Duration::from_millis(self.timeout_ms))
            .insecure(insecure))
    }

    /// Builds the client configuration.
    pub fn to_config(&self) -> Result<GrpcClientConfig, ConfigError> {
        self.builder()?
            .build()
            .map_err(|e| ConfigError::invalid("grpc_client", e))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
