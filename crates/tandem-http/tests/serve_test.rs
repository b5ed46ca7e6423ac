//! Server and client over a real socket.

use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};
use tandem_core::{CallContext, Code, StatusError};
use tandem_http::{
    HttpClient, HttpClientConfig, HttpServer, HttpServerConfig, MethodDesc, ServiceDesc,
    ShutdownSignal,
};
use tokio::net::TcpListener;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Order {
    item: String,
    quantity: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Receipt {
    id: String,
}

async fn place(_ctx: CallContext, order: Order) -> Result<Receipt, StatusError> {
    if order.quantity == 0 {
        return Err(StatusError::failed_precondition("EmptyOrder", "quantity must be positive")
            .with_metadata("item", order.item));
    }
    Ok(Receipt {
        id: format!("{}x{}", order.quantity, order.item),
    })
}

#[tokio::test]
async fn round_trip_over_tcp_and_graceful_shutdown() {
    let config = HttpServerConfig::builder()
        .addr("127.0.0.1:0")
        .shutdown_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let mut server = HttpServer::new(config);
    server.register(
        ServiceDesc::new("shop.v1.Orders").method(MethodDesc::new(Method::POST, "/v1/orders", place)),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let serving = tokio::spawn(server.serve(listener, shutdown.clone()));

    let client = HttpClient::new(
        HttpClientConfig::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
    )
    .unwrap();
    let url = format!("http://{addr}/v1/orders");

    let receipt: Receipt = client
        .invoke(
            CallContext::new(),
            Method::POST,
            &url,
            Order {
                item: "tea".into(),
                quantity: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.id, "3xtea");

    let err = client
        .invoke::<Order, Receipt>(
            CallContext::new(),
            Method::POST,
            &url,
            Order {
                item: "tea".into(),
                quantity: 0,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    assert_eq!(err.reason(), "EmptyOrder");
    assert_eq!(err.metadata()["item"], "tea");

    let err = client
        .invoke::<Order, Receipt>(
            CallContext::new(),
            Method::POST,
            &format!("http://{addr}/v1/refunds"),
            Order::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpClient::new(
        HttpClientConfig::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
    )
    .unwrap();

    let err = client
        .invoke::<Order, Receipt>(
            CallContext::new(),
            Method::POST,
            &format!("http://{addr}/v1/orders"),
            Order::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}
