//! HTTP server adapter.
//!
//! Services are registered from a [`ServiceDesc`]: a list of method
//! descriptors binding a verb and a path template to a typed handler. Each
//! call runs through the same pipeline as the gRPC adapter:
//!
//! ```text
//! Received ─▶ ContextAttached ─▶ [recovery ▶ decode ▶ global ▶ service ▶ handler]
//!          ─▶ ReplyEncoded | ErrorEncoded
//! ```
//!
//! Decoding happens inside the recovery guard but before the middleware
//! chain, so middleware sees the typed request.

use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tandem_core::{CallContext, ServiceId, StatusError, TransportKind};
use tandem_encoding::Message;
use tandem_middleware::{run_guarded, BoxFuture, Dispatcher, Handler, Middleware, Payload};
use tokio::net::{TcpListener, TcpStream};

use crate::codec::HttpResponse;
use crate::router::RouteTable;
use crate::shutdown::ConnectionTracker;
use crate::{HttpError, HttpServerConfig, ShutdownSignal};

/// What an HTTP call looked like on arrival, attached to the call context.
///
/// Handlers can also add response headers through it.
#[derive(Debug, Clone)]
pub struct HttpServerInfo {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    vars: HashMap<String, String>,
    response_headers: Arc<Mutex<HeaderMap>>,
}

impl HttpServerInfo {
    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the variables captured from the path template.
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Returns one path variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Sets a header on the eventual response, replacing earlier values.
    pub fn set_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.response_headers.lock().insert(name, value);
    }
}

type NewRequest = Arc<dyn Fn() -> Payload + Send + Sync>;

/// Raw route handler: the whole request in, a response out.
pub type RawHandler = Arc<
    dyn Fn(CallContext, Request<Bytes>) -> BoxFuture<'static, Result<HttpResponse, StatusError>>
        + Send
        + Sync,
>;

/// One exposed operation of a service.
#[derive(Clone)]
pub struct MethodDesc {
    method: Method,
    path: String,
    new_request: NewRequest,
    handler: Handler,
}

impl MethodDesc {
    /// Binds `method` and the path template `path` to a typed handler.
    ///
    /// The request starts from `Req::default()`, so an empty body is valid.
    pub fn new<Req, Res, F, Fut>(method: Method, path: impl Into<String>, handler: F) -> Self
    where
        Req: Message + Default,
        Res: Message,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, StatusError>> + Send + 'static,
    {
        Self {
            method,
            path: path.into(),
            new_request: Arc::new(|| Box::new(Req::default())),
            handler: Handler::typed(handler),
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path template.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A service and the methods it exposes over HTTP.
#[derive(Debug, Clone)]
pub struct ServiceDesc {
    name: ServiceId,
    methods: Vec<MethodDesc>,
}

impl ServiceDesc {
    /// Creates an empty descriptor.
    pub fn new(name: impl Into<ServiceId>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }

    /// Returns the service identifier.
    pub fn name(&self) -> &ServiceId {
        &self.name
    }

    /// Returns the methods in registration order.
    pub fn methods(&self) -> &[MethodDesc] {
        &self.methods
    }
}

#[derive(Clone)]
enum Route {
    Typed { service: ServiceId, method: MethodDesc },
    Raw(RawHandler),
}

/// HTTP server adapter.
pub struct HttpServer {
    config: HttpServerConfig,
    dispatcher: Dispatcher,
    routes: RouteTable<Route>,
}

impl HttpServer {
    /// Creates a server with no routes.
    pub fn new(config: HttpServerConfig) -> Self {
        let mut dispatcher = Dispatcher::new().with_recovery(Arc::clone(config.recovery()));
        dispatcher
            .middleware_mut()
            .set_global(config.middleware().to_vec());
        Self {
            config,
            dispatcher,
            routes: RouteTable::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Registers every method of `service`. A method on an already routed
    /// verb and path replaces the earlier binding.
    pub fn register(&mut self, service: ServiceDesc) -> &mut Self {
        for method in service.methods {
            let verb = method.method.clone();
            let path = method.path.clone();
            let route = Route::Typed {
                service: service.name.clone(),
                method,
            };
            if self.routes.insert(verb.clone(), &path, route) {
                tracing::warn!(method = %verb, path = %path, "route replaced");
            }
        }
        self
    }

    /// Registers middleware for one service, replacing any previous chain.
    pub fn use_service(
        &mut self,
        service: impl Into<ServiceId>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> &mut Self {
        self.dispatcher
            .middleware_mut()
            .set_service(service.into(), middleware);
        self
    }

    /// Registers a raw handler for `method` and `path`.
    ///
    /// Raw handlers get the whole request and build their own response. They
    /// bypass codecs and middleware but still run under panic recovery.
    pub fn handle<F, Fut>(&mut self, path: &str, method: Method, handler: F) -> &mut Self
    where
        F: Fn(CallContext, Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, StatusError>> + Send + 'static,
    {
        let raw: RawHandler = Arc::new(move |ctx, req| Box::pin(handler(ctx, req)));
        if self.routes.insert(method.clone(), path, Route::Raw(raw)) {
            tracing::warn!(method = %method, path = %path, "route replaced");
        }
        self
    }

    /// Serves one request.
    pub async fn dispatch<B>(&self, request: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();
        let error_encoder = self.config.error_encoder();

        let Some(matched) = self.routes.find(&parts.method, parts.uri.path()) else {
            tracing::debug!(method = %parts.method, path = parts.uri.path(), "no route");
            let err = StatusError::not_found(
                "NotFound",
                format!("no route for {} {}", parts.method, parts.uri.path()),
            );
            return error_encoder(&parts.headers, &err);
        };

        let response_headers = Arc::new(Mutex::new(HeaderMap::new()));
        let info = HttpServerInfo {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            vars: matched.vars,
            response_headers: Arc::clone(&response_headers),
        };
        let ctx = CallContext::new()
            .with_transport(TransportKind::Http)
            .with_operation(format!("{} {}", parts.method, matched.template))
            .with_server_info(info);
        let summary = format!("{} {}", parts.method, parts.uri);
        let headers = parts.headers.clone();

        let guard_ctx = ctx.clone();
        let result = run_guarded(&guard_ctx, &summary, self.config.recovery(), async {
            match matched.target {
                Route::Typed { service, method } => {
                    let bytes = read_body(body, self.config.max_body_size()).await?;
                    let mut request = (method.new_request)();
                    (self.config.request_decoder())(&headers, &bytes[..], &mut *request)?;
                    let handler = self
                        .dispatcher
                        .middleware()
                        .compose(Some(service), method.handler.clone());
                    let reply = handler.call(ctx, request).await?;
                    (self.config.response_encoder())(&headers, &*reply)
                }
                Route::Raw(raw) => {
                    let bytes = read_body(body, self.config.max_body_size()).await?;
                    raw(ctx, Request::from_parts(parts, bytes)).await
                }
            }
        })
        .await;

        let mut response = match result {
            Ok(response) => response,
            Err(err) => error_encoder(&headers, &err),
        };
        let extra = std::mem::take(&mut *response_headers.lock());
        response.headers_mut().extend(extra);
        response
    }

    /// Binds the configured address and serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), HttpError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), HttpError> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HttpError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` triggers, then waits
    /// up to the configured shutdown timeout for open connections to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), HttpError> {
        let local = listener.local_addr().ok();
        let server = Arc::new(self);
        let tracker = ConnectionTracker::default();
        tracing::info!(addr = ?local, routes = server.routes.len(), "http server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = Arc::clone(&server);
                        let shutdown = shutdown.clone();
                        let guard = tracker.open();
                        tokio::spawn(async move {
                            server.serve_connection(stream, peer, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                () = shutdown.recv() => break,
            }
        }

        let grace = server.config.shutdown_timeout();
        tracing::info!(open = tracker.active(), grace_ms = grace.as_millis(), "http server draining");
        if tokio::time::timeout(grace, tracker.drained()).await.is_err() {
            tracing::warn!(open = tracker.active(), "shutdown timeout reached");
        }
        tracing::info!("http server stopped");
        Ok(())
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: ShutdownSignal,
    ) {
        let server = Arc::clone(&self);
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.dispatch(req).await) }
        });
        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            res = conn.as_mut() => res,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };
        if let Err(e) = result {
            tracing::debug!(%peer, error = %e, "connection closed with error");
        }
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, StatusError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    Limited::new(body, limit)
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                StatusError::resource_exhausted(
                    "BodyTooLarge",
                    format!("request body exceeds {limit} bytes"),
                )
            } else {
                StatusError::data_loss("DataLoss", format!("reading request body: {e}"))
            }
        })
}
