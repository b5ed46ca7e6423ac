//! Ordered middleware chains and per-server middleware sets.
//!
//! Given middlewares `[m1, m2, ..., mn]`, a [`Chain`] runs as
//! `m1(m2(...mn(terminal)...))`: `m1` sees the call first on entry and last on
//! exit. A chain always holds at least one middleware.
//!
//! A [`MiddlewareSet`] holds a server's global chain plus one chain per
//! service. At dispatch the service chain wraps the terminal handler first and
//! the global chain wraps the result, so global middleware is outermost.

use std::collections::HashMap;
use std::sync::Arc;

use tandem_core::{CallContext, ServiceId};

use crate::middleware::{wrap, BoxFuture, Handler, HandlerResult, Middleware, Next, Payload};

/// A non-empty, ordered list of middlewares.
#[derive(Clone)]
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates a chain with `first` outermost followed by `rest` in order.
    pub fn new(
        first: Arc<dyn Middleware>,
        rest: impl IntoIterator<Item = Arc<dyn Middleware>>,
    ) -> Self {
        let mut stages = vec![first];
        stages.extend(rest);
        Self { stages }
    }

    /// Creates a chain from a list, or `None` when the list is empty.
    pub fn from_vec(stages: Vec<Arc<dyn Middleware>>) -> Option<Self> {
        if stages.is_empty() {
            None
        } else {
            Some(Self { stages })
        }
    }

    /// Returns the number of middlewares.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`; chains are never empty.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Wraps `terminal`, producing the composed handler.
    ///
    /// Composition has no side effects; everything happens when the returned
    /// handler is called.
    pub fn then(&self, terminal: Handler) -> Handler {
        self.stages
            .iter()
            .rev()
            .fold(terminal, |next, middleware| wrap(Arc::clone(middleware), next))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A chain is itself a middleware, so chains nest.
impl Middleware for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        let terminal = next.into_handler();
        let handler = self.then(terminal);
        Box::pin(async move { handler.call(ctx, request).await })
    }
}

/// Global and per-service middleware for one server.
///
/// Populated at startup, read-only while serving.
#[derive(Clone, Default)]
pub struct MiddlewareSet {
    global: Option<Chain>,
    services: HashMap<ServiceId, Chain>,
}

impl MiddlewareSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global chain. An empty list clears it.
    pub fn set_global(&mut self, middlewares: Vec<Arc<dyn Middleware>>) {
        self.global = Chain::from_vec(middlewares);
    }

    /// Sets the chain for one service. An empty list clears it.
    pub fn set_service(&mut self, service: ServiceId, middlewares: Vec<Arc<dyn Middleware>>) {
        match Chain::from_vec(middlewares) {
            Some(chain) => {
                self.services.insert(service, chain);
            }
            None => {
                self.services.remove(&service);
            }
        }
    }

    /// Returns the global chain.
    pub fn global(&self) -> Option<&Chain> {
        self.global.as_ref()
    }

    /// Returns the chain registered for `service`.
    pub fn service(&self, service: &ServiceId) -> Option<&Chain> {
        self.services.get(service)
    }

    /// Builds the handler for a call to `service`.
    pub fn compose(&self, service: Option<&ServiceId>, terminal: Handler) -> Handler {
        let handler = match service.and_then(|id| self.services.get(id)) {
            Some(chain) => chain.then(terminal),
            None => terminal,
        };
        match &self.global {
            Some(chain) => chain.then(handler),
            None => handler,
        }
    }
}

impl std::fmt::Debug for MiddlewareSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareSet")
            .field("global", &self.global)
            .field("services", &self.services)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnMiddleware;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn marker(name: &'static str, log: &Log) -> Arc<dyn Middleware> {
        let log = Arc::clone(log);
        Arc::new(FnMiddleware::new(name, move |ctx, req, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}-enter"));
                let res = next.run(ctx, req).await;
                log.lock().push(format!("{name}-exit"));
                res
            }
        }))
    }

    fn terminal(log: &Log) -> Handler {
        let log = Arc::clone(log);
        Handler::new(move |_ctx, req| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push("terminal".to_string());
                Ok(req)
            }
        })
    }

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let log = Log::default();
        let chain = Chain::new(marker("m1", &log), [marker("m2", &log)]);
        chain
            .then(terminal(&log))
            .call(CallContext::new(), Box::new(()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            ["m1-enter", "m2-enter", "terminal", "m2-exit", "m1-exit"]
        );
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        assert!(Chain::from_vec(Vec::new()).is_none());
        let log = Log::default();
        let chain = Chain::from_vec(vec![marker("a", &log), marker("b", &log)]).unwrap();
        assert_eq!(chain.names(), ["a", "b"]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_composition_has_no_side_effects() {
        let log = Log::default();
        let chain = Chain::new(marker("m1", &log), []);
        let _handler = chain.then(terminal(&log));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_nested_chain_keeps_order() {
        let log = Log::default();
        let inner: Arc<dyn Middleware> =
            Arc::new(Chain::new(marker("b", &log), [marker("c", &log)]));
        let outer = Chain::new(marker("a", &log), [inner]);
        outer
            .then(terminal(&log))
            .call(CallContext::new(), Box::new(()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            ["a-enter", "b-enter", "c-enter", "terminal", "c-exit", "b-exit", "a-exit"]
        );
    }

    #[tokio::test]
    async fn test_global_wraps_service() {
        let log = Log::default();
        let mut set = MiddlewareSet::new();
        set.set_service(ServiceId::from("svc"), vec![marker("S", &log)]);
        set.set_global(vec![marker("G", &log)]);

        set.compose(Some(&ServiceId::from("svc")), terminal(&log))
            .call(CallContext::new(), Box::new(()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            ["G-enter", "S-enter", "terminal", "S-exit", "G-exit"]
        );
    }

    #[tokio::test]
    async fn test_other_services_skip_service_chain() {
        let log = Log::default();
        let mut set = MiddlewareSet::new();
        set.set_service(ServiceId::from("svc"), vec![marker("S", &log)]);

        set.compose(Some(&ServiceId::from("other")), terminal(&log))
            .call(CallContext::new(), Box::new(()))
            .await
            .unwrap();
        assert_eq!(*log.lock(), ["terminal"]);

        set.set_service(ServiceId::from("svc"), Vec::new());
        assert!(set.service(&ServiceId::from("svc")).is_none());
    }
}
