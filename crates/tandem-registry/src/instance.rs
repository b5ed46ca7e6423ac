//! Service instance records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Endpoint, RegistryError};

/// One running instance of a service, as registered with a discovery system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInstance {
    /// Unique instance id.
    pub id: String,
    /// Service name shared by all instances.
    pub name: String,
    /// Version of the running build.
    pub version: String,
    /// Free-form key/value metadata.
    pub metadata: HashMap<String, String>,
    /// Endpoint URIs, e.g. `grpc://10.0.0.7:9000?isSecure=false`.
    pub endpoints: Vec<String>,
}

impl ServiceInstance {
    /// Creates an instance record with no endpoints.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl ToString) -> Self {
        self.endpoints.push(endpoint.to_string());
        self
    }

    /// Parses every endpoint URI.
    pub fn parsed_endpoints(&self) -> Result<Vec<Endpoint>, RegistryError> {
        self.endpoints.iter().map(|e| Endpoint::parse(e)).collect()
    }

    /// Returns the first endpoint with `scheme` that parses.
    pub fn endpoint(&self, scheme: &str) -> Option<Endpoint> {
        self.endpoints
            .iter()
            .filter_map(|e| Endpoint::parse(e).ok())
            .find(|e| e.scheme() == scheme)
    }

    /// Checks that the record can be registered.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.id.is_empty() {
            return Err(RegistryError::MissingField("id"));
        }
        if self.name.is_empty() {
            return Err(RegistryError::MissingField("name"));
        }
        self.parsed_endpoints().map(drop)
    }
}
