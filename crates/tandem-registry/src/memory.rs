//! In-process registry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tandem_core::CallContext;
use tokio::sync::watch;

use crate::{Discovery, Registrar, RegistryError, ServiceInstance, Watcher};

type Services = RwLock<HashMap<String, watch::Sender<Vec<ServiceInstance>>>>;

/// Registrar and discovery backed by a process-local map.
///
/// Each service name owns a `watch` channel holding its instance list, so
/// watchers wake on every change. A name is forgotten once it has no instances
/// and no live watchers. Useful for tests and single-process setups.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    services: Arc<Services>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Runs `f` on the channel for `name` while the map lock is held, so a
    // concurrent prune cannot drop the channel out from under it.
    fn with_channel<R>(
        &self,
        name: &str,
        f: impl FnOnce(&watch::Sender<Vec<ServiceInstance>>) -> R,
    ) -> R {
        if let Some(tx) = self.services.read().get(name) {
            return f(tx);
        }
        let mut services = self.services.write();
        let tx = services
            .entry(name.to_string())
            .or_insert_with(|| watch::Sender::new(Vec::new()));
        f(tx)
    }
}

/// Removes `name` when its list is empty and no receivers beyond `held` remain.
fn prune(services: &Services, name: &str, held: usize) {
    let mut services = services.write();
    let idle = services
        .get(name)
        .is_some_and(|tx| tx.receiver_count() <= held && tx.borrow().is_empty());
    if idle {
        services.remove(name);
        tracing::debug!(service = %name, "service entry pruned");
    }
}

#[async_trait]
impl Registrar for MemoryRegistry {
    async fn register(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        instance.validate()?;
        self.with_channel(&instance.name, |tx| {
            tx.send_modify(|list| {
                match list.iter_mut().find(|existing| existing.id == instance.id) {
                    Some(existing) => *existing = instance.clone(),
                    None => list.push(instance.clone()),
                }
            });
        });
        tracing::info!(service = %instance.name, id = %instance.id, "instance registered");
        Ok(())
    }

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        let removed = self.services.read().get(&instance.name).is_some_and(|tx| {
            tx.send_if_modified(|list| {
                let before = list.len();
                list.retain(|existing| existing.id != instance.id);
                list.len() != before
            })
        });
        if removed {
            prune(&self.services, &instance.name, 0);
            tracing::info!(service = %instance.name, id = %instance.id, "instance deregistered");
        }
        Ok(())
    }
}

#[async_trait]
impl Discovery for MemoryRegistry {
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        Ok(self
            .services
            .read()
            .get(name)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default())
    }

    async fn list_services(&self) -> Result<HashMap<String, Vec<ServiceInstance>>, RegistryError> {
        Ok(self
            .services
            .read()
            .iter()
            .map(|(name, tx)| (name.clone(), tx.borrow().clone()))
            .filter(|(_, list)| !list.is_empty())
            .collect())
    }

    async fn resolve(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError> {
        Ok(Box::new(MemoryWatcher {
            rx: self.with_channel(name, watch::Sender::subscribe),
            services: Arc::downgrade(&self.services),
            name: name.to_string(),
            first: true,
            closed: false,
        }))
    }
}

struct MemoryWatcher {
    rx: watch::Receiver<Vec<ServiceInstance>>,
    services: Weak<Services>,
    name: String,
    first: bool,
    closed: bool,
}

#[async_trait]
impl Watcher for MemoryWatcher {
    async fn watch(&mut self, ctx: &CallContext) -> Result<Vec<ServiceInstance>, RegistryError> {
        if self.closed {
            return Err(RegistryError::Closed);
        }
        if std::mem::take(&mut self.first) {
            let current = self.rx.borrow_and_update().clone();
            if !current.is_empty() {
                return Ok(current);
            }
        }

        let changed = self.rx.changed();
        let result = match ctx.remaining() {
            Some(left) => tokio::time::timeout(left, changed)
                .await
                .map_err(|_| RegistryError::DeadlineExceeded)?,
            None => changed.await,
        };
        result.map_err(|_| RegistryError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl Drop for MemoryWatcher {
    fn drop(&mut self) {
        if let Some(services) = self.services.upgrade() {
            prune(&services, &self.name, 1);
        }
    }
}
