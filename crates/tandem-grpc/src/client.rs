//! gRPC client adapter.
//!
//! [`GrpcClient::call`] wraps one unary invocation on a tonic channel:
//!
//! ```text
//! [recovery ▶ timeout ▶ user interceptors ▶ error decoding ▶ network]
//! ```
//!
//! Error decoding sits next to the network so it always sees the raw status;
//! user interceptors observe decoded [`StatusError`]s. Panic recovery guards
//! the whole call at its single entry point.

use std::future::Future;
use std::sync::Arc;

use tandem_core::{CallContext, StatusError, TransportKind};
use tandem_encoding::Proto;
use tandem_middleware::{run_guarded, Chain, Handler};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::{GrpcClientConfig, GrpcError};

/// gRPC client adapter bound to one channel.
#[derive(Clone)]
pub struct GrpcClient {
    channel: Channel,
    config: GrpcClientConfig,
    interceptors: Option<Chain>,
}

impl GrpcClient {
    /// Creates a client whose channel connects on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(config: GrpcClientConfig) -> Result<Self, GrpcError> {
        let channel = endpoint(&config)?.connect_lazy();
        Ok(Self::with_channel(config, channel))
    }

    /// Creates a client and establishes its connection.
    pub async fn connect(config: GrpcClientConfig) -> Result<Self, GrpcError> {
        let channel = endpoint(&config)?.connect().await?;
        tracing::debug!(grpc_target = config.target(), "grpc channel connected");
        Ok(Self::with_channel(config, channel))
    }

    /// Creates a client over an existing channel.
    pub fn with_channel(config: GrpcClientConfig, channel: Channel) -> Self {
        let interceptors = Chain::from_vec(config.interceptors().to_vec());
        Self {
            channel,
            config,
            interceptors,
        }
    }

    /// Returns the underlying channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GrpcClientConfig {
        &self.config
    }

    /// Performs one unary call.
    ///
    /// `invoke` issues the request on the channel, usually through a generated
    /// client: `|ch, req| async move { GreeterClient::new(ch).say_hello(req).await }`.
    /// The call fails with `DeadlineExceeded` once the configured timeout, or an
    /// earlier deadline already on `ctx`, elapses.
    pub async fn call<Req, Res, F, Fut>(
        &self,
        ctx: CallContext,
        method: &str,
        request: Req,
        invoke: F,
    ) -> Result<Res, StatusError>
    where
        Req: prost::Message + Default + 'static,
        Res: prost::Message + Default + 'static,
        F: Fn(Channel, tonic::Request<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<tonic::Response<Res>, tonic::Status>> + Send + 'static,
    {
        let ctx = ctx
            .with_transport(TransportKind::Grpc)
            .with_operation(method)
            .with_timeout(self.config.timeout());
        let budget = ctx.remaining().unwrap_or_else(|| self.config.timeout());

        let channel = self.channel.clone();
        let decoder = Arc::clone(self.config.error_decoder());
        let network = Handler::typed(move |ctx: CallContext, req: Proto<Req>| {
            let mut request = tonic::Request::new(req.into_inner());
            if let Some(remaining) = ctx.remaining() {
                request.set_timeout(remaining);
            }
            let response = invoke(channel.clone(), request);
            let decoder = Arc::clone(&decoder);
            async move {
                match response.await {
                    Ok(response) => Ok(Proto(response.into_inner())),
                    Err(status) => Err(decoder(&status)),
                }
            }
        });
        let handler = match &self.interceptors {
            Some(chain) => chain.then(network),
            None => network,
        };

        let guard_ctx = ctx.clone();
        let reply = run_guarded(&guard_ctx, method, self.config.recovery(), async move {
            let pending = handler.call(ctx, Box::new(Proto(request)));
            match tokio::time::timeout(budget, pending).await {
                Ok(result) => result,
                Err(_) => Err(StatusError::deadline_exceeded(
                    "DeadlineExceeded",
                    format!("call did not complete within {}ms", budget.as_millis()),
                )),
            }
        })
        .await?;

        match reply.downcast::<Proto<Res>>() {
            Some(reply) => {
                let Proto(reply) = *reply;
                Ok(reply)
            }
            None => Err(StatusError::internal(
                "PayloadType",
                format!("interceptor replaced the reply for {method}"),
            )),
        }
    }
}

impl std::fmt::Debug for GrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn endpoint(config: &GrpcClientConfig) -> Result<Endpoint, GrpcError> {
    let uri = config.endpoint_uri();
    let mut endpoint = Endpoint::from_shared(uri.clone())?.connect_timeout(config.timeout());
    if uri.starts_with("https://") {
        endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
    } else if !config.is_insecure() {
        tracing::warn!(grpc_target = config.target(), "plaintext target on a secure client");
    }
    Ok(endpoint)
}
