//! # Tandem Middleware
//!
//! Middleware composition and dispatch shared by the gRPC and HTTP adapters.
//!
//! - [`Handler`]: cloneable async function of `(CallContext, Payload)`
//! - [`Middleware`]: wraps a handler, continuing the call through [`Next`]
//! - [`Chain`]: non-empty ordered middleware list, first entry outermost
//! - [`MiddlewareSet`]: a server's global chain and per-service chains
//! - [`Dispatcher`]: composes the chain for a call and contains panics
//!
//! ```text
//! request ─▶ [recovery] ─▶ global chain ─▶ service chain ─▶ handler
//! ```

mod chain;
mod dispatch;
mod logging;
mod middleware;

pub use chain::{Chain, MiddlewareSet};
pub use dispatch::{run_guarded, Dispatcher};
pub use logging::LoggingMiddleware;
pub use middleware::{
    wrap, BoxFuture, FnMiddleware, Handler, HandlerResult, Middleware, Next, Payload,
};
