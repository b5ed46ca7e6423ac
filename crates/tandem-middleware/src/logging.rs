//! Access logging.
//!
//! [`LoggingMiddleware`] emits one structured event per call with the
//! transport, operation, latency and, for failures, the status code and
//! reason. Successful calls log at `info`; client-class failures at `warn`;
//! everything else at `error`.

use std::time::Instant;

use tandem_core::{CallContext, Code};

use crate::middleware::{BoxFuture, HandlerResult, Middleware, Next, Payload};

/// Middleware that logs every call it observes.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    component: Option<String>,
}

impl LoggingMiddleware {
    /// Creates a logging middleware.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every event with `component`, e.g. `"server"` or `"client"`.
    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let started = Instant::now();
            let request_id = ctx.request_id();
            let transport = ctx.transport().map_or("", |t| t.as_str());
            let operation = ctx.operation().unwrap_or("").to_string();
            let component = self.component.as_deref().unwrap_or("");

            let result = next.run(ctx, request).await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(_) => tracing::info!(
                    %request_id,
                    component,
                    transport,
                    operation = %operation,
                    duration_ms,
                    code = 0,
                    "call completed"
                ),
                Err(err) if is_client_error(err.code()) => tracing::warn!(
                    %request_id,
                    component,
                    transport,
                    operation = %operation,
                    duration_ms,
                    code = err.code().as_i32(),
                    reason = err.reason(),
                    error = %err,
                    "call failed"
                ),
                Err(err) => tracing::error!(
                    %request_id,
                    component,
                    transport,
                    operation = %operation,
                    duration_ms,
                    code = err.code().as_i32(),
                    reason = err.reason(),
                    error = %err,
                    "call failed"
                ),
            }
            result
        })
    }
}

fn is_client_error(code: Code) -> bool {
    matches!(
        code,
        Code::Canceled
            | Code::InvalidArgument
            | Code::NotFound
            | Code::AlreadyExists
            | Code::PermissionDenied
            | Code::ResourceExhausted
            | Code::FailedPrecondition
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unauthenticated
    )
}
