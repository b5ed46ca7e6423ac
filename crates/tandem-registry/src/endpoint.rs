//! Endpoint URIs.
//!
//! Instances advertise endpoints as URIs such as
//! `grpc://10.0.0.7:9000?isSecure=false` or `http://10.0.0.7:8000`. The scheme
//! names the transport; query parameters carry flags.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::RegistryError;

/// Query key for the transport security flag.
pub const SECURE_KEY: &str = "isSecure";

/// A parsed endpoint URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    query: BTreeMap<String, String>,
}

impl Endpoint {
    /// Creates an endpoint with no query flags.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            query: BTreeMap::new(),
        }
    }

    /// Parses `grpc://host:port?isSecure=false` style URIs.
    ///
    /// Host and a non-zero port are required.
    pub fn parse(uri: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidEndpoint {
            endpoint: uri.to_string(),
            reason,
        };
        let url = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("host is missing".into())),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("port is missing".into()))?;
        if port == 0 {
            return Err(invalid("port 0 is out of range".into()));
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            query: url.query_pairs().into_owned().collect(),
        })
    }

    /// Sets the security flag.
    #[must_use]
    pub fn with_secure(self, secure: bool) -> Self {
        self.with_query(SECURE_KEY, secure.to_string())
    }

    /// Sets a query flag.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Returns the scheme, e.g. `grpc`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `host:port`, bracketing IPv6 hosts.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns a query flag.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Returns the security flag, if present and a valid boolean.
    pub fn is_secure(&self) -> Option<bool> {
        self.query(SECURE_KEY).and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
