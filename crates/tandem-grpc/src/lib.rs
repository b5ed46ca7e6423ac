//! # Tandem gRPC
//!
//! gRPC adapters for tandem, built on `tonic`.
//!
//! - [`GrpcServer`] dispatches unary calls from generated tonic services
//!   through the global and per-service middleware chains with panic recovery
//!   and maps errors onto `tonic::Status`.
//! - [`GrpcClient`] wraps unary invocations on a `tonic` channel with a
//!   per-call timeout, user interceptors, status decoding and panic recovery.
//!
//! Errors cross the wire as a native status plus one `google.rpc.ErrorInfo`
//! detail; see [`encode_error`] and [`decode_error`].

mod client;
mod config;
mod error;
mod server;
mod status;

pub use client::GrpcClient;
pub use config::{
    GrpcClientConfig, GrpcClientConfigBuilder, GrpcServerConfig, GrpcServerConfigBuilder,
    DEFAULT_CLIENT_TIMEOUT, DEFAULT_GRPC_ADDR,
};
pub use error::GrpcError;
pub use server::{parse_grpc_timeout, GrpcServer, GrpcServerInfo};
pub use status::{
    decode_error, default_error_decoder, default_error_encoder, encode_error, from_tonic_code,
    to_tonic_code, ErrorDecoder, ErrorEncoder, ErrorInfo, RpcStatus, ERROR_INFO_TYPE_URL,
};
