//! Client call pipeline: decoding, timeout, interceptors and recovery.
//!
//! The channel is lazy and never dialed; each test supplies an invoker that
//! answers in place of the network.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tandem_core::{CallContext, Code, StatusError, TransportKind};
use tandem_grpc::{encode_error, GrpcClient, GrpcClientConfig};
use tandem_middleware::{FnMiddleware, Middleware};
use tonic::transport::Channel;

#[derive(Clone, PartialEq, prost::Message)]
struct Ping {
    #[prost(uint32, tag = "1")]
    seq: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
struct Pong {
    #[prost(uint32, tag = "1")]
    seq: u32,
}

const METHOD: &str = "/ping.v1.Pinger/Ping";

fn client(config: tandem_grpc::GrpcClientConfigBuilder) -> GrpcClient {
    GrpcClient::connect_lazy(config.insecure(true).build().unwrap()).unwrap()
}

fn builder() -> tandem_grpc::GrpcClientConfigBuilder {
    GrpcClientConfig::builder("127.0.0.1:1")
}

#[tokio::test]
async fn successful_call_returns_reply() {
    let client = client(builder());

    let pong: Pong = client
        .call(CallContext::new(), METHOD, Ping { seq: 7 }, |_ch: Channel, req| async move {
            Ok::<_, tonic::Status>(tonic::Response::new(Pong {
                seq: req.into_inner().seq + 1,
            }))
        })
        .await
        .unwrap();

    assert_eq!(pong.seq, 8);
}

#[tokio::test]
async fn server_error_is_decoded() {
    let client = client(builder());

    let err = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, _req| async {
            Err::<tonic::Response<Pong>, _>(encode_error(
                &StatusError::not_found("PingerGone", "no pinger").with_metadata("zone", "b"),
            ))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.reason(), "PingerGone");
    assert_eq!(err.message(), "no pinger");
    assert_eq!(err.metadata().get("zone").map(String::as_str), Some("b"));
}

#[tokio::test]
async fn status_without_details_keeps_only_the_code() {
    let client = client(builder());

    let err = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, _req| async {
            Err::<tonic::Response<Pong>, _>(tonic::Status::unavailable("connection refused"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unavailable);
    assert_eq!(err.reason(), "");
    assert_eq!(err.message(), "");
}

#[tokio::test(start_paused = true)]
async fn slow_call_hits_deadline() {
    let client = client(builder().timeout(Duration::from_millis(50)));

    let err = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, _req| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, tonic::Status>(tonic::Response::new(Pong::default()))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert_eq!(err.reason(), "DeadlineExceeded");
}

#[tokio::test(start_paused = true)]
async fn earlier_context_deadline_wins() {
    let client = client(builder().timeout(Duration::from_secs(10)));
    let ctx = CallContext::new().with_timeout(Duration::from_millis(20));

    let err = client
        .call(ctx, METHOD, Ping::default(), |_ch: Channel, _req| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, tonic::Status>(tonic::Response::new(Pong::default()))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn invoker_sees_request_timeout_header() {
    let client = client(builder().timeout(Duration::from_millis(300)));

    let pong: Pong = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, req| async move {
            let has_timeout = req.metadata().get("grpc-timeout").is_some();
            Ok::<_, tonic::Status>(tonic::Response::new(Pong {
                seq: u32::from(has_timeout),
            }))
        })
        .await
        .unwrap();

    assert_eq!(pong.seq, 1);
}

#[tokio::test]
async fn panicking_invoker_is_recovered() {
    let client = client(builder());

    let err = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, _req| async {
            if true {
                panic!("invoker blew up");
            }
            Ok::<_, tonic::Status>(tonic::Response::new(Pong::default()))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unknown);
    assert_eq!(err.reason(), "Unknown");
    assert!(err.message().contains("invoker blew up"));
}

#[tokio::test]
async fn interceptors_run_in_order_and_observe_decoded_errors() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let observer = |name: &'static str, log: &Arc<Mutex<Vec<String>>>| -> Arc<dyn Middleware> {
        let log = Arc::clone(log);
        Arc::new(FnMiddleware::new(name, move |ctx: CallContext, req, next| {
            let log = Arc::clone(&log);
            async move {
                assert_eq!(ctx.transport(), Some(TransportKind::Grpc));
                log.lock().push(format!("{name}>"));
                let res = next.run(ctx, req).await;
                if let Err(err) = &res {
                    log.lock().push(format!("<{name}:{}", err.reason()));
                }
                res
            }
        }))
    };

    let client = client(
        builder()
            .interceptor(observer("A", &log))
            .interceptor(observer("B", &log)),
    );

    let err = client
        .call(CallContext::new(), METHOD, Ping::default(), |_ch: Channel, _req| async {
            Err::<tonic::Response<Pong>, _>(encode_error(&StatusError::aborted(
                "Contended",
                "retry later",
            )))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Aborted);
    assert_eq!(
        *log.lock(),
        vec!["A>", "B>", "<B:Contended", "<A:Contended"]
    );
}
