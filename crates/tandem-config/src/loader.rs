//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use tandem_telemetry::LogFormat;

use crate::{ConfigError, NegotiationMode, TandemConfig};

/// Loads a [`TandemConfig`] in layers, later layers winning:
///
/// 1. defaults or a preset
/// 2. TOML or JSON files and strings, merged key by key
/// 3. environment variables `PREFIX__SECTION__KEY`
///
/// ```no_run
/// use tandem_config::ConfigLoader;
///
/// # fn main() -> Result<(), tandem_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("tandem.toml")?
///     .with_env_prefix("TANDEM")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: TandemConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Starts from [`TandemConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from [`TandemConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TandemConfig::development();
        self
    }

    /// Starts from [`TandemConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TandemConfig::production();
        self
    }

    /// Merges a `.toml` or `.json` file. Unknown keys are rejected.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        self.with_string(&content, format)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration text in `format` (`toml` or `json`).
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_ascii_lowercase().as_str() {
            "toml" => {
                let table: toml::Table = toml::from_str(content)?;
                serde_json::to_value(table)?
            }
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Enables environment overrides such as `TANDEM__HTTP_SERVER__ADDR`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_ascii_uppercase());
        self
    }

    /// Applies environment overrides, validates, and returns the result.
    pub fn load(mut self) -> Result<TandemConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            let mut vars: Vec<(String, String)> =
                env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
            vars.sort();
            for (key, value) in vars {
                self.apply_env(&key, &key[marker.len()..], &value)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TandemConfig {
        self.config
    }

    fn apply_env(&mut self, var: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = key.split("__").collect();
        let config = &mut self.config;
        match parts.as_slice() {
            ["HTTP_SERVER", "ADDR"] => config.http_server.addr = value.to_string(),
            ["HTTP_SERVER", "SHUTDOWN_TIMEOUT_MS"] => {
                config.http_server.shutdown_timeout_ms = parse(var, value, "expected integer")?;
            }
            ["HTTP_SERVER", "MAX_BODY_SIZE"] => {
                config.http_server.max_body_size = parse(var, value, "expected integer")?;
            }
            ["HTTP_SERVER", "NEGOTIATION"] => {
                config.http_server.negotiation = match value.to_ascii_lowercase().as_str() {
                    "mirror" => NegotiationMode::Mirror,
                    "accept" => NegotiationMode::Accept,
                    _ => return Err(ConfigError::env(var, "expected 'mirror' or 'accept'")),
                };
            }

            ["HTTP_CLIENT", "TIMEOUT_MS"] => {
                config.http_client.timeout_ms = parse(var, value, "expected integer")?;
            }
            ["HTTP_CLIENT", "KEEP_ALIVE_SECS"] => {
                config.http_client.keep_alive_secs = parse(var, value, "expected integer")?;
            }
            ["HTTP_CLIENT", "MAX_IDLE_CONNS"] => {
                config.http_client.max_idle_conns = parse(var, value, "expected integer")?;
            }
            ["HTTP_CLIENT", "USER_AGENT"] => {
                config.http_client.user_agent = non_empty(value);
            }
            ["HTTP_CLIENT", "CONTENT_TYPE"] => config.http_client.content_type = value.to_string(),

            ["GRPC_SERVER", "ADDR"] => config.grpc_server.addr = value.to_string(),

            ["GRPC_CLIENT", "TARGET"] => config.grpc_client.target = value.to_string(),
            ["GRPC_CLIENT", "TIMEOUT_MS"] => {
                config.grpc_client.timeout_ms = parse(var, value, "expected integer")?;
            }
            ["GRPC_CLIENT", "INSECURE"] => {
                config.grpc_client.insecure =
                    parse_bool(value).ok_or_else(|| ConfigError::env(var, "expected boolean"))?;
            }

            ["LOGGING", "ENABLED"] => {
                config.logging.enabled =
                    parse_bool(value).ok_or_else(|| ConfigError::env(var, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_ascii_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    "compact" => LogFormat::Compact,
                    _ => {
                        return Err(ConfigError::env(
                            var,
                            "expected 'json', 'pretty' or 'compact'",
                        ))
                    }
                };
            }
            ["LOGGING", "SERVICE_NAME"] => config.logging.service_name = value.to_string(),
            ["LOGGING", flag @ ("ENV_OVERRIDE" | "SPAN_EVENTS" | "FILE_LINE_INFO"
                | "THREAD_IDS" | "INCLUDE_TARGET")] => {
                let on =
                    parse_bool(value).ok_or_else(|| ConfigError::env(var, "expected boolean"))?;
                let slot = match *flag {
                    "ENV_OVERRIDE" => &mut config.logging.env_override,
                    "SPAN_EVENTS" => &mut config.logging.span_events,
                    "FILE_LINE_INFO" => &mut config.logging.file_line_info,
                    "THREAD_IDS" => &mut config.logging.thread_ids,
                    _ => &mut config.logging.include_target,
                };
                *slot = on;
            }

            _ => return Err(ConfigError::env(var, "unknown configuration key")),
        }
        Ok(())
    }
}

fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn parse<T: FromStr>(var: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::env(var, expected))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
