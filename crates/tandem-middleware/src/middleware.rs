//! Handler and middleware types.
//!
//! A [`Handler`] is an async function of `(CallContext, Payload)` returning a
//! payload or a [`StatusError`]. A [`Middleware`] sits in front of a handler
//! and receives a [`Next`] to continue the call. [`wrap`] turns a middleware
//! and the handler it guards into a new handler, which is all chain
//! composition needs.
//!
//! # Example
//!
//! ```
//! use tandem_core::CallContext;
//! use tandem_middleware::{wrap, FnMiddleware, Handler, Payload};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let echo = Handler::new(|_ctx, req: Payload| async move { Ok(req) });
//! let audit = FnMiddleware::new("audit", |ctx, req, next| async move {
//!     let res = next.run(ctx, req).await;
//!     res
//! });
//!
//! let handler = wrap(Arc::new(audit), echo);
//! let res = handler.call(CallContext::new(), Box::new(5_u32)).await.unwrap();
//! assert_eq!(res.downcast_ref::<u32>(), Some(&5));
//! # });
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tandem_core::{CallContext, StatusError};
use tandem_encoding::Message;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased request or response.
pub type Payload = Box<dyn Message>;

/// Outcome of one handler invocation.
pub type HandlerResult = Result<Payload, StatusError>;

type HandlerFn = dyn Fn(CallContext, Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A cloneable async request handler.
#[derive(Clone)]
pub struct Handler {
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Creates a handler from an async function.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(CallContext, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |ctx, req| Box::pin(func(ctx, req))),
        }
    }

    /// Creates a handler from a function over concrete request and response
    /// types.
    ///
    /// A payload of any other type is rejected with `Internal`; that only
    /// happens when a middleware swaps the request for a different type.
    pub fn typed<Req, Res, F, Fut>(func: F) -> Self
    where
        Req: Message,
        Res: Message,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, StatusError>> + Send + 'static,
    {
        Self::new(move |ctx, req: Payload| {
            let actual = req.type_name();
            let call = req.downcast::<Req>().map(|req| func(ctx, *req));
            async move {
                match call {
                    Some(fut) => fut.await.map(|res| Box::new(res) as Payload),
                    None => Err(StatusError::internal(
                        "PayloadType",
                        format!("expected request {}, got {actual}", type_name::<Req>()),
                    )),
                }
            }
        })
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: CallContext, request: Payload) -> BoxFuture<'static, HandlerResult> {
        (self.func)(ctx, request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

/// The rest of the chain, handed to a middleware.
///
/// `run` consumes `self`, so a middleware continues the call at most once.
/// Dropping it without running short-circuits the chain.
#[derive(Debug)]
pub struct Next {
    handler: Handler,
}

impl Next {
    pub(crate) fn new(handler: Handler) -> Self {
        Self { handler }
    }

    pub(crate) fn into_handler(self) -> Handler {
        self.handler
    }

    /// Invokes the next middleware or the terminal handler.
    pub async fn run(self, ctx: CallContext, request: Payload) -> HandlerResult {
        self.handler.call(ctx, request).await
    }
}

/// A request-transforming wrapper around a handler.
///
/// Implementations observe the call on entry, decide whether to continue via
/// [`Next::run`], and observe the result on exit.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &'static str;

    /// Processes one call.
    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// Wraps `next` in `middleware`, producing a handler that runs the middleware
/// first.
pub fn wrap(middleware: Arc<dyn Middleware>, next: Handler) -> Handler {
    Handler::new(move |ctx, req| {
        let middleware = Arc::clone(&middleware);
        let next = Next::new(next.clone());
        async move { middleware.process(ctx, req, next).await }
    })
}

/// A middleware defined by an async function.
///
/// ```
/// use tandem_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |ctx, req, next| async move {
///     let started = std::time::Instant::now();
///     let res = next.run(ctx, req).await;
///     tracing::debug!(elapsed = ?started.elapsed(), "call finished");
///     res
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub fn new<Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(CallContext, Payload, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self { name, func }
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(CallContext, Payload, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Payload,
        next: Next,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin((self.func)(ctx, request, next))
    }
}
