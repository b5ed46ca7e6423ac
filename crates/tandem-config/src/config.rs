//! The root configuration type.

use serde::{Deserialize, Serialize};
use tandem_telemetry::LogConfig;

use crate::{
    ConfigError, GrpcClientSettings, GrpcServerSettings, HttpClientSettings, HttpServerSettings,
};

/// Settings for every adapter of one process.
///
/// ```
/// use tandem_config::TandemConfig;
///
/// let config = TandemConfig::default();
/// assert_eq!(config.http_server.addr, "0.0.0.0:8000");
/// assert_eq!(config.grpc_server.addr, "0.0.0.0:9000");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TandemConfig {
    /// HTTP server adapter.
    pub http_server: HttpServerSettings,
    /// HTTP client adapter.
    pub http_client: HttpClientSettings,
    /// gRPC server adapter.
    pub grpc_server: GrpcServerSettings,
    /// gRPC client adapter. Left unvalidated while `target` is empty.
    pub grpc_client: GrpcClientSettings,
    /// Log subscriber.
    pub logging: LogConfig,
}

impl TandemConfig {
    /// Defaults with human-readable debug logging.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Defaults with JSON logging.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Checks every section by building the adapter configuration it
    /// describes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http_server.to_config()?;
        self.http_client.to_config()?;
        self.grpc_server.to_config()?;
        if !self.grpc_client.target.is_empty() {
            self.grpc_client.to_config()?;
        }
        tandem_telemetry::env_filter(&self.logging.level)
            .map_err(|e| ConfigError::invalid("logging.level", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_telemetry::LogFormat;

    #[test]
    fn test_presets() {
        assert_eq!(TandemConfig::production().logging.format, LogFormat::Json);
        assert_eq!(TandemConfig::development().logging.level, "debug");
        assert!(TandemConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_catches_each_section() {
        let mut config = TandemConfig::default();
        config.http_server.addr = "nowhere".into();
        assert!(config.validate().is_err());

        let mut config = TandemConfig::default();
        config.grpc_client.target = "catalog:9000".into();
        config.grpc_client.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TandemConfig::default();
        config.logging.level = "tandem=shouty".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.level"
        ));
    }
}
