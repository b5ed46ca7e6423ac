//! gRPC server adapter.
//!
//! Generated tonic service implementations delegate each unary method to
//! [`GrpcServer::unary`], which runs the call through the same dispatch
//! pipeline as the HTTP adapter:
//!
//! ```text
//! Received ─▶ ContextAttached ─▶ [recovery ▶ global ▶ service ▶ handler]
//!          ─▶ ReplyEncoded | ErrorEncoded
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tandem_core::{CallContext, ServiceId, StatusError, TransportKind};
use tandem_encoding::Proto;
use tandem_middleware::{Dispatcher, Handler, Middleware};
use tonic::metadata::MetadataMap;

use crate::{GrpcError, GrpcServerConfig};

/// What a gRPC call looked like on arrival, attached to the call context.
#[derive(Debug, Clone)]
pub struct GrpcServerInfo {
    service: ServiceId,
    full_method: String,
    metadata: MetadataMap,
}

impl GrpcServerInfo {
    /// Returns the service the call targets.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// Returns the full method name, e.g. `/helloworld.Greeter/SayHello`.
    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    /// Returns the request metadata.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }
}

/// gRPC server adapter.
#[derive(Debug, Clone)]
pub struct GrpcServer {
    config: GrpcServerConfig,
    dispatcher: Dispatcher,
}

impl GrpcServer {
    /// Creates a server adapter.
    pub fn new(config: GrpcServerConfig) -> Self {
        let mut dispatcher = Dispatcher::new().with_recovery(Arc::clone(config.recovery()));
        dispatcher
            .middleware_mut()
            .set_global(config.middleware().to_vec());
        Self { config, dispatcher }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GrpcServerConfig {
        &self.config
    }

    /// Registers middleware for one service, replacing any previous chain.
    ///
    /// Registration happens before serving; the set is read-only afterwards.
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

    /// Dispatches one unary call.
    ///
    /// `handler` receives the decoded request; its reply or error is mapped
    /// back onto the wire. Panics anywhere in the chain come back as an
    /// `Unknown` status. A `grpc-timeout` header bounds the whole chain.
    pub async fn unary<Req, Res, F, Fut>(
        &self,
        service: &ServiceId,
        full_method: &str,
        request: tonic::Request<Req>,
        handler: F,
    ) -> Result<tonic::Response<Res>, tonic::Status>
    where
        Req: prost::Message + Default + 'static,
        Res: prost::Message + Default + 'static,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, StatusError>> + Send + 'static,
    {
        let (metadata, _extensions, message) = request.into_parts();
        let timeout = metadata
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);

        let mut ctx = CallContext::new()
            .with_transport(TransportKind::Grpc)
            .with_operation(full_method)
            .with_server_info(GrpcServerInfo {
                service: service.clone(),
                full_method: full_method.to_string(),
                metadata,
            });
        if let Some(timeout) = timeout {
            ctx = ctx.with_timeout(timeout);
        }

        let terminal = Handler::typed(move |ctx, req: Proto<Req>| {
            let reply = handler(ctx, req.into_inner());
            async move { reply.await.map(Proto) }
        });

        let encoder = self.config.error_encoder();
        let remaining = ctx.remaining();
        let call = self
            .dispatcher
            .dispatch(ctx, Some(service), Box::new(Proto(message)), terminal);
        let result = match remaining {
            Some(left) => tokio::time::timeout(left, call).await.unwrap_or_else(|_| {
                Err(StatusError::deadline_exceeded(
                    "DeadlineExceeded",
                    format!("{full_method} exceeded its grpc-timeout"),
                ))
            }),
            None => call.await,
        };
        match result {
            Ok(reply) => match reply.downcast::<Proto<Res>>() {
                Some(reply) => {
                    let Proto(reply) = *reply;
                    Ok(tonic::Response::new(reply))
                }
                None => Err(encoder(&StatusError::internal(
                    "PayloadType",
                    format!("middleware replaced the reply for {full_method}"),
                ))),
            },
            Err(err) => Err(encoder(&err)),
        }
    }

    /// Serves `routes` on the configured address until `signal` resolves.
    pub async fn serve_with_shutdown<S>(
        &self,
        routes: tonic::service::Routes,
        signal: S,
    ) -> Result<(), GrpcError>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = self.config.socket_addr()?;
        tracing::info!(%addr, "grpc server listening");
        let mut builder = tonic::transport::Server::builder();
        builder
            .add_routes(routes)
            .serve_with_shutdown(addr, signal)
            .await?;
        tracing::info!(%addr, "grpc server stopped");
        Ok(())
    }
}

/// Parses a `grpc-timeout` header value such as `"250m"` or `"3S"`.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("3S"), Some(Duration::from_secs(3)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("10u"), Some(Duration::from_micros(10)));
        assert_eq!(parse_grpc_timeout("m"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("1é"), None);
    }
}
