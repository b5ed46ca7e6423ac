use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use tandem::http::{Method, Request, StatusCode};
use tandem::prelude::*;
use tandem::registry::MemoryRegistry;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Lookup {
    sku: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Stock {
    sku: String,
    available: u32,
    transport: String,
}

async fn lookup(ctx: CallContext, req: Lookup) -> StatusResult<Stock> {
    if req.sku.is_empty() {
        return Err(StatusError::invalid_argument("SkuRequired", "sku is empty"));
    }
    Ok(Stock {
        sku: req.sku,
        available: 7,
        transport: ctx.transport().map(|t| t.to_string()).unwrap_or_default(),
    })
}

fn stamp() -> Arc<dyn Middleware> {
    Arc::new(FnMiddleware::new("stamp", |ctx: CallContext, req, next: Next| async move {
        if let Some(info) = ctx.server_info::<HttpServerInfo>() {
            info.set_response_header(
                tandem::http::HeaderName::from_static("x-stamp"),
                tandem::http::HeaderValue::from_static("inventory"),
            );
        }
        next.run(ctx, req).await
    }))
}

fn post(uri: &str, body: &'static str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

#[tokio::test]
async fn configured_server_dispatches_through_middleware() {
    let config = ConfigLoader::new()
        .with_string("[http_server]\naddr = \"127.0.0.1:0\"\n", "toml")
        .unwrap()
        .load()
        .unwrap();

    let mut server = HttpServer::new(config.http_server.to_config().unwrap());
    server
        .register(
            ServiceDesc::new("inventory.v1.Stock")
                .method(MethodDesc::new(Method::POST, "/v1/stock", lookup)),
        )
        .use_service("inventory.v1.Stock", vec![stamp()]);

    let response = server.dispatch(post("/v1/stock", r#"{"sku":"A-1"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-stamp"], "inventory");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let stock: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stock["sku"], "A-1");
    assert_eq!(stock["available"], 7);
    assert_eq!(stock["transport"], TransportKind::Http.to_string());

    let response = server.dispatch(post("/v1/stock", "{}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registry_resolves_endpoints_for_clients() {
    let registry = MemoryRegistry::new();
    let instance = ServiceInstance::new("inv-1", "inventory")
        .with_endpoint("http://10.0.0.4:8000")
        .with_endpoint("grpc://10.0.0.4:9000?isSecure=false");
    registry.register(&instance).await.unwrap();

    let found = registry.get_service("inventory").await.unwrap();
    assert_eq!(found.len(), 1);
    let grpc: Endpoint = found[0].endpoint("grpc").unwrap();
    assert_eq!(grpc.authority(), "10.0.0.4:9000");
    assert_eq!(grpc.is_secure(), Some(false));
}

#[test]
fn status_codes_are_shared_across_transports() {
    let err = StatusError::not_found("SkuUnknown", "no such sku");
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.code().http_status(), StatusCode::NOT_FOUND);
}
