//! Panic containment.
//!
//! Every adapter runs its whole middleware chain inside [`catch_panic`]. A panic
//! anywhere in user code, middleware included, surfaces as a [`PanicReport`]
//! holding the panic value and the backtrace captured at the panic site. The
//! adapter hands the report to its [`RecoveryHandler`], which turns it into the
//! [`StatusError`] sent back to the caller.
//!
//! ```
//! use tandem_core::{catch_panic, default_recovery_handler, CallContext, Code};
//!
//! # tokio_test::block_on(async {
//! let outcome = catch_panic(async { panic!("boom") }).await;
//! let report = outcome.unwrap_err();
//! assert_eq!(report.message(), "boom");
//!
//! let err = default_recovery_handler()(&CallContext::new(), "request", &report);
//! assert_eq!(err.code(), Code::Unknown);
//! assert_eq!(err.reason(), "Unknown");
//! # });
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::poll_fn;
use futures_util::FutureExt;

use crate::{CallContext, StatusError};

/// Converts a contained panic into the error returned to the caller.
///
/// Arguments are the call context, a printable summary of the request, and the
/// panic report.
pub type RecoveryHandler =
    Arc<dyn Fn(&CallContext, &str, &PanicReport) -> StatusError + Send + Sync>;

/// A panic caught at a dispatch boundary.
#[derive(Debug, Clone)]
pub struct PanicReport {
    message: String,
    backtrace: Option<String>,
}

impl PanicReport {
    /// Builds a report from a panic payload.
    pub fn from_payload(payload: &(dyn Any + Send), backtrace: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self { message, backtrace }
    }

    /// Returns the panic value rendered as text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the backtrace captured where the panic happened, when available.
    #[must_use]
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Returns the stock recovery handler.
///
/// It logs the panic value, request summary and backtrace at `error` level and
/// returns an `Unknown` status error with reason `"Unknown"`.
pub fn default_recovery_handler() -> RecoveryHandler {
    Arc::new(|ctx, request, report| {
        tracing::error!(
            request_id = %ctx.request_id(),
            transport = ctx.transport().map_or("", |t| t.as_str()),
            operation = ctx.operation().unwrap_or(""),
            request = %request,
            panic = %report.message(),
            backtrace = report.backtrace().unwrap_or(""),
            "panic recovered"
        );
        StatusError::unknown("Unknown", format!("panic triggered: {}", report.message()))
    })
}

/// Runs `future` inside a panic boundary.
///
/// Resolves to `Err(PanicReport)` if any poll of `future` panics.
pub async fn catch_panic<F: Future>(future: F) -> Result<F::Output, PanicReport> {
    install_hook();
    let mut future = pin!(future);
    let marked = poll_fn(move |cx| {
        let _scope = GuardScope::enter();
        future.as_mut().poll(cx)
    });

    match AssertUnwindSafe(marked).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(payload) => {
            let backtrace = CAPTURED.with(|slot| slot.borrow_mut().take()).or_else(|| {
                // Our hook did not see the panic, so another one replaced it.
                // Chain back in for the next panic and trace the boundary now.
                HOOK_INSTALLED.store(false, Ordering::Release);
                install_hook();
                Some(Backtrace::force_capture().to_string())
            });
            Err(PanicReport::from_payload(payload.as_ref(), backtrace))
        }
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Marks the current thread as polling guarded code.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

// Panics inside a guard record their backtrace for the report instead of
// printing; everything else goes to the hook that was installed before.
fn install_hook() {
    if HOOK_INSTALLED.swap(true, Ordering::AcqRel) {
        return;
    }
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if GUARD_DEPTH.with(Cell::get) > 0 {
            let trace = Backtrace::force_capture().to_string();
            CAPTURED.with(|slot| *slot.borrow_mut() = Some(trace));
        } else {
            previous(info);
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::{Code, TransportKind};

    #[tokio::test]
    async fn test_ready_future_passes_through() {
        let outcome = catch_panic(async { 7 }).await;
        assert_eq!(outcome.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_panic_after_await_is_caught() {
        let outcome = catch_panic(async {
            tokio::task::yield_now().await;
            panic!("late {}", 42);
        })
        .await;

        let report: PanicReport = match outcome {
            Ok(()) => panic!("expected a panic report"),
            Err(report) => report,
        };
        assert_eq!(report.message(), "late 42");
        assert!(report.backtrace().is_some());
    }

    #[tokio::test]
    async fn test_nested_guards_report_innermost() {
        let outer = catch_panic(async {
            let inner = catch_panic(async { panic!("inner") }).await;
            inner.map_err(|r| r.message().to_string())
        })
        .await;

        assert_eq!(outer.unwrap(), Err("inner".to_string()));
    }

    #[tokio::test]
    async fn test_backtrace_survives_a_replaced_hook() {
        let first = catch_panic(async { panic!("one") }).await.unwrap_err();
        assert!(first.backtrace().is_some());

        let unguarded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&unguarded);
        panic::set_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let second = catch_panic(async { panic!("two") }).await.unwrap_err();
        assert_eq!(second.message(), "two");
        assert!(second.backtrace().is_some());

        let third = catch_panic(async { panic!("three") }).await.unwrap_err();
        assert_eq!(third.message(), "three");
        assert!(third.backtrace().is_some());

        let before = unguarded.load(Ordering::SeqCst);
        let _ = std::thread::spawn(|| panic!("outside any guard")).join();
        assert!(unguarded.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_non_string_payload() {
        let report = PanicReport::from_payload(&17_u32, None);
        assert_eq!(report.message(), "Box<dyn Any>");
        assert!(report.backtrace().is_none());
    }

    #[test]
    fn test_default_handler_returns_unknown() {
        let ctx = CallContext::new().with_transport(TransportKind::Grpc);
        let report = PanicReport::from_payload(&"boom", None);
        let err = default_recovery_handler()(&ctx, "req", &report);
        assert_eq!(err.code(), Code::Unknown);
        assert_eq!(err.reason(), "Unknown");
        assert_eq!(err.message(), "panic triggered: boom");
    }
}
