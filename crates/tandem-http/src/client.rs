//! HTTP client adapter.
//!
//! [`HttpClient::execute`] wraps one round trip:
//!
//! ```text
//! [recovery ▶ user agent ▶ timeout ▶ round trip ▶ error decoding]
//! ```
//!
//! [`HttpClient::invoke`] adds codec encoding and decoding plus the configured
//! middleware on top, so typed calls look the same as gRPC client calls.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderValue, Method, Request, Response};
use tandem_core::{CallContext, Code, StatusError, TransportKind};
use tandem_encoding::{global, Message};
use tandem_middleware::{run_guarded, Chain, Handler};

use crate::{HttpClientConfig, HttpError};

/// User agent sent when neither the request nor the config sets one.
pub const DEFAULT_USER_AGENT: &str = concat!("tandem-http/", env!("CARGO_PKG_VERSION"));

/// Turns a completed response into an error when it represents one.
pub type ErrorDecoder = Arc<dyn Fn(&Response<Bytes>) -> Result<(), StatusError> + Send + Sync>;

/// The round-trip capability the client delegates to.
#[async_trait]
pub trait RoundTrip: Send + Sync + 'static {
    /// Sends `request` and reads the full response.
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, StatusError>;
}

/// [`RoundTrip`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a pooled client with the keep-alive and idle limits of `config`.
    ///
    /// The keep-alive also applies at the TCP level, and connecting is
    /// bounded by the per-call timeout.
    pub fn new(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .tcp_keepalive(config.keep_alive())
            .pool_idle_timeout(config.keep_alive())
            .pool_max_idle_per_host(config.max_idle_conns())
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoundTrip for ReqwestTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, StatusError> {
        let request = reqwest::Request::try_from(request)
            .map_err(|e| StatusError::invalid_argument("InvalidRequest", e.to_string()))?;
        let response = self.client.execute(request).await.map_err(transport_error)?;

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| StatusError::data_loss("DataLoss", format!("reading response body: {e}")))?;

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

fn transport_error(err: reqwest::Error) -> StatusError {
    if err.is_timeout() {
        StatusError::deadline_exceeded("DeadlineExceeded", err.to_string())
    } else if err.is_connect() {
        StatusError::unavailable("Unavailable", err.to_string())
    } else {
        StatusError::unknown("Unknown", err.to_string())
    }
}

/// HTTP client adapter.
#[derive(Clone)]
pub struct HttpClient {
    config: HttpClientConfig,
    transport: Arc<dyn RoundTrip>,
    middleware: Option<Chain>,
}

impl HttpClient {
    /// Creates a client over a pooled `reqwest` transport.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(config: HttpClientConfig, transport: impl RoundTrip) -> Self {
        let middleware = Chain::from_vec(config.middleware().to_vec());
        Self {
            config,
            transport: Arc::new(transport),
            middleware,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Sends one request.
    ///
    /// Fails with `DeadlineExceeded` once the configured timeout, or an
    /// earlier deadline on `ctx`, elapses. Non-2xx responses are turned into
    /// errors by the configured decoder.
    pub async fn execute(
        &self,
        ctx: &CallContext,
        mut request: Request<Bytes>,
    ) -> Result<Response<Bytes>, StatusError> {
        if !request.headers().contains_key(USER_AGENT) {
            let agent = self.config.user_agent().unwrap_or(DEFAULT_USER_AGENT);
            if let Ok(value) = HeaderValue::from_str(agent) {
                request.headers_mut().insert(USER_AGENT, value);
            }
        }

        let ctx = ctx
            .clone()
            .with_transport(TransportKind::Http)
            .with_timeout(self.config.timeout());
        let budget = ctx.remaining().unwrap_or_else(|| self.config.timeout());
        let summary = format!("{} {}", request.method(), request.uri());

        let transport = Arc::clone(&self.transport);
        let decoder = Arc::clone(self.config.error_decoder());
        run_guarded(&ctx, &summary, self.config.recovery(), async move {
            let response = tokio::time::timeout(budget, transport.round_trip(request))
                .await
                .map_err(|_| {
                    StatusError::deadline_exceeded(
                        "DeadlineExceeded",
                        format!("request did not complete within {}ms", budget.as_millis()),
                    )
                })??;
            decoder(&response)?;
            Ok::<_, StatusError>(response)
        })
        .await
    }

    /// Performs a typed call: encodes `request` with the configured content
    /// type, runs the configured middleware, sends it to `url` and decodes the
    /// reply.
    pub async fn invoke<Req, Res>(
        &self,
        ctx: CallContext,
        method: Method,
        url: &str,
        request: Req,
    ) -> Result<Res, StatusError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let ctx = ctx
            .with_transport(TransportKind::Http)
            .with_operation(format!("{method} {url}"));

        let client = self.clone();
        let target = url.to_string();
        let verb = method.clone();
        let terminal = Handler::typed(move |ctx: CallContext, req: Req| {
            let client = client.clone();
            let target = target.clone();
            let verb = verb.clone();
            async move {
                let request = client.encode_request(verb, &target, &req)?;
                let response = client.execute(&ctx, request).await?;
                let mut reply = Res::default();
                decode_response(&response, &mut reply)?;
                Ok::<_, StatusError>(reply)
            }
        });
        let handler = match &self.middleware {
            Some(chain) => chain.then(terminal),
            None => terminal,
        };

        let guard_ctx = ctx.clone();
        let summary = format!("{method} {url}");
        let reply = run_guarded(&guard_ctx, &summary, self.config.recovery(), async move {
            handler.call(ctx, Box::new(request)).await
        })
        .await?;

        match reply.downcast::<Res>() {
            Some(reply) => Ok(*reply),
            None => Err(StatusError::internal(
                "PayloadType",
                format!("middleware replaced the reply for {summary}"),
            )),
        }
    }

    fn encode_request(
        &self,
        method: Method,
        url: &str,
        message: &dyn Message,
    ) -> Result<Request<Bytes>, StatusError> {
        let codec = global()
            .for_content_type(Some(self.config.content_type()))
            .ok_or_else(|| {
                StatusError::internal(
                    "CodecNotFound",
                    format!("no codec for {}", self.config.content_type()),
                )
            })?;
        let body = codec.marshal(message)?;
        let content_type = codec.content_type();
        Request::builder()
            .method(method)
            .uri(url)
            .header(CONTENT_TYPE, &content_type)
            .header(ACCEPT, &content_type)
            .body(body)
            .map_err(|e| StatusError::invalid_argument("InvalidRequest", e.to_string()))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Default error decoder.
///
/// A 2xx response passes. Otherwise the code comes from the status table and
/// the reason, message and metadata from a marshaled status error in the body,
/// if there is one. A code in the body wins when it maps back onto the same
/// HTTP status, so `AlreadyExists` survives a 409 and `Unknown` a 500.
pub fn check_response(response: &Response<Bytes>) -> Result<(), StatusError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let code = Code::from_http_status(status);
    let err = match body_error(response) {
        Some(err) if err.code().http_status() == status => err,
        Some(err) => err.with_code(code),
        None => StatusError::from_code(code),
    };
    Err(err)
}

fn body_error(response: &Response<Bytes>) -> Option<StatusError> {
    if response.body().is_empty() {
        return None;
    }
    let codec = global().for_content_type(crate::codec::content_type(response.headers()))?;
    let mut err = StatusError::default();
    codec.unmarshal(response.body(), &mut err).ok()?;
    Some(err)
}

/// Decodes a successful response body into `target` with the codec named by
/// the response content type. An empty body leaves `target` untouched.
pub fn decode_response(
    response: &Response<Bytes>,
    target: &mut dyn Message,
) -> Result<(), StatusError> {
    let content_type = crate::codec::content_type(response.headers());
    let codec = global().for_content_type(content_type).ok_or_else(|| {
        StatusError::unknown(
            "Unknown",
            format!("no codec for response content type {:?}", content_type.unwrap_or_default()),
        )
    })?;
    if response.body().is_empty() {
        return Ok(());
    }
    codec.unmarshal(response.body(), target).map_err(StatusError::from)
}
