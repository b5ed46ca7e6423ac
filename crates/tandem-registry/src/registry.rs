//! Collaborator interfaces for service registration and discovery.
//!
//! Backends (an in-process map, consul, etcd, ...) implement these traits; the
//! transport adapters never depend on a particular backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tandem_core::CallContext;

use crate::{RegistryError, ServiceInstance};

/// Publishes instances of the local process.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Registers `instance`, replacing a record with the same name and id.
    async fn register(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;

    /// Removes `instance`. Removing an unknown instance is not an error.
    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;
}

/// Looks up instances of remote services.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Returns the current instances of `name`; empty when none are known.
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Returns every known service with its instances.
    async fn list_services(&self) -> Result<HashMap<String, Vec<ServiceInstance>>, RegistryError>;

    /// Creates a watcher over the instances of `name`.
    async fn resolve(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError>;
}

/// Follows the instance list of one service.
#[async_trait]
pub trait Watcher: Send {
    /// Returns the instance list when this is the first call and the list is
    /// not empty, or when it changes.
    ///
    /// Otherwise waits until a change, the deadline on `ctx`, or
    /// [`close`](Watcher::close).
    async fn watch(&mut self, ctx: &CallContext) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Stops the watcher. Later calls to `watch` fail with
    /// [`RegistryError::Closed`].
    fn close(&mut self);
}
