//! The recovering dispatcher.
//!
//! Both server adapters dispatch calls the same way: pick the composed handler
//! for the target service, run it inside a panic boundary, and turn a contained
//! panic into a status error through the configured recovery handler. The
//! boundary wraps the whole chain, so a panicking middleware is contained
//! exactly like a panicking handler.

use std::future::Future;

use tandem_core::{catch_panic, default_recovery_handler, CallContext, RecoveryHandler, ServiceId};

use crate::{Handler, HandlerResult, MiddlewareSet, Payload};

/// Runs `future` inside a panic boundary.
///
/// On panic, `recovery` receives the context, the request summary and the
/// panic report, and its error becomes the result.
pub async fn run_guarded<F, T>(
    ctx: &CallContext,
    request: &str,
    recovery: &RecoveryHandler,
    future: F,
) -> Result<T, tandem_core::StatusError>
where
    F: Future<Output = Result<T, tandem_core::StatusError>>,
{
    match catch_panic(future).await {
        Ok(result) => result,
        Err(report) => Err(recovery(ctx, request, &report)),
    }
}

/// Middleware set plus recovery handler for one server.
#[derive(Clone)]
pub struct Dispatcher {
    middleware: MiddlewareSet,
    recovery: RecoveryHandler,
}

impl Dispatcher {
    /// Creates a dispatcher with no middleware and the default recovery handler.
    pub fn new() -> Self {
        Self {
            middleware: MiddlewareSet::new(),
            recovery: default_recovery_handler(),
        }
    }

    /// Replaces the recovery handler.
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryHandler) -> Self {
        self.recovery = recovery;
        self
    }

    /// Returns the middleware set for registration.
    pub fn middleware_mut(&mut self) -> &mut MiddlewareSet {
        &mut self.middleware
    }

    /// Returns the middleware set.
    pub fn middleware(&self) -> &MiddlewareSet {
        &self.middleware
    }

    /// Returns the recovery handler.
    pub fn recovery(&self) -> &RecoveryHandler {
        &self.recovery
    }

    /// Dispatches one call through the composed chain for `service`.
    pub async fn dispatch(
        &self,
        ctx: CallContext,
        service: Option<&ServiceId>,
        request: Payload,
        terminal: Handler,
    ) -> HandlerResult {
        let summary = request.type_name();
        let handler = self.middleware.compose(service, terminal);
        let guard_ctx = ctx.clone();
        run_guarded(&guard_ctx, summary, &self.recovery, async move {
            handler.call(ctx, request).await
        })
        .await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}
