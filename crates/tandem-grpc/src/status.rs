//! Status error wire mapping for gRPC.
//!
//! A [`StatusError`] travels as a native `grpc-status` with the same numeric
//! code. Its reason, message and metadata ride in one `google.rpc.ErrorInfo`
//! detail attached through `grpc-status-details-bin`; the message sits under
//! the `"message"` metadata key. The native status message reads
//! `"{reason}: {message}"` for peers that ignore details.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message as _;
use tandem_core::{Code, StatusError, MESSAGE_METADATA_KEY};

/// Type URL of the structured error detail.
pub const ERROR_INFO_TYPE_URL: &str = "type.googleapis.com/google.rpc.ErrorInfo";

/// Server-side conversion from a status error to the native status.
pub type ErrorEncoder = Arc<dyn Fn(&StatusError) -> tonic::Status + Send + Sync>;

/// Client-side conversion from the native status to a status error.
pub type ErrorDecoder = Arc<dyn Fn(&tonic::Status) -> StatusError + Send + Sync>;

/// `google.rpc.ErrorInfo`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ErrorInfo {
    /// Machine-readable reason.
    #[prost(string, tag = "1")]
    pub reason: String,
    /// Logical error domain. Always empty for tandem errors.
    #[prost(string, tag = "2")]
    pub domain: String,
    /// Additional structured details.
    #[prost(map = "string, string", tag = "3")]
    pub metadata: HashMap<String, String>,
}

/// `google.rpc.Status`, the payload of `grpc-status-details-bin`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcStatus {
    /// Numeric status code.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Developer-facing message.
    #[prost(string, tag = "2")]
    pub message: String,
    /// Attached detail records.
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

/// Maps a canonical code onto tonic's code.
pub fn to_tonic_code(code: Code) -> tonic::Code {
    tonic::Code::from_i32(code.as_i32())
}

/// Maps tonic's code onto the canonical code.
pub fn from_tonic_code(code: tonic::Code) -> Code {
    Code::from_i32_lossy(code as i32)
}

/// Encodes `err` as a native status carrying one `ErrorInfo` detail.
pub fn encode_error(err: &StatusError) -> tonic::Status {
    let mut metadata = err.metadata().clone();
    metadata.insert(MESSAGE_METADATA_KEY.to_string(), err.message().to_string());

    let info = ErrorInfo {
        reason: err.reason().to_string(),
        domain: String::new(),
        metadata,
    };
    let message = format!("{}: {}", err.reason(), err.message());
    let status = RpcStatus {
        code: err.code().as_i32(),
        message: message.clone(),
        details: vec![prost_types::Any {
            type_url: ERROR_INFO_TYPE_URL.to_string(),
            value: info.encode_to_vec(),
        }],
    };

    tonic::Status::with_details(
        to_tonic_code(err.code()),
        message,
        Bytes::from(status.encode_to_vec()),
    )
}

/// Decodes a native status.
///
/// The first `ErrorInfo` detail supplies reason, message and metadata. Without
/// one, the result carries only the code.
pub fn decode_error(status: &tonic::Status) -> StatusError {
    let code = from_tonic_code(status.code());
    match error_info(status.details()) {
        Some(mut info) => {
            let message = info.metadata.remove(MESSAGE_METADATA_KEY).unwrap_or_default();
            StatusError::new(code, info.reason, message).with_metadata_map(info.metadata)
        }
        None => StatusError::from_code(code),
    }
}

fn error_info(details: &[u8]) -> Option<ErrorInfo> {
    if details.is_empty() {
        return None;
    }
    let status = RpcStatus::decode(details).ok()?;
    status
        .details
        .iter()
        .find(|any| any.type_url.ends_with("google.rpc.ErrorInfo"))
        .and_then(|any| ErrorInfo::decode(any.value.as_slice()).ok())
}

/// Returns the stock encoder, [`encode_error`].
pub fn default_error_encoder() -> ErrorEncoder {
    Arc::new(encode_error)
}

/// Returns the stock decoder, [`decode_error`].
pub fn default_error_decoder() -> ErrorDecoder {
    Arc::new(decode_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_share_integer_space() {
        for code in Code::ALL {
            assert_eq!(to_tonic_code(code) as i32, code.as_i32());
            assert_eq!(from_tonic_code(to_tonic_code(code)), code);
        }
    }

    #[test]
    fn test_encode_attaches_error_info() {
        let err = StatusError::not_found("BookMissing", "book 9").with_metadata("shelf", "3");
        let status = encode_error(&err);

        assert_eq!(status.code(), tonic::Code::NotFound);
        assert_eq!(status.message(), "BookMissing: book 9");

        let info = error_info(status.details()).unwrap();
        assert_eq!(info.reason, "BookMissing");
        assert_eq!(info.metadata.get("message").map(String::as_str), Some("book 9"));
        assert_eq!(info.metadata.get("shelf").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_round_trip_keeps_message_and_matching() {
        let err = StatusError::already_exists("Duplicate", "name taken").with_metadata("k", "v");
        let back = decode_error(&encode_error(&err));

        assert_eq!(back, err);
        assert_eq!(back.message(), "name taken");
        assert_eq!(back.metadata().get("k").map(String::as_str), Some("v"));
        assert!(!back.metadata().contains_key("message"));
    }

    #[test]
    fn test_plain_status_decodes_to_code_only() {
        let back = decode_error(&tonic::Status::unavailable("connection refused"));
        assert_eq!(back.code(), Code::Unavailable);
        assert_eq!(back.reason(), "");
        assert_eq!(back.message(), "");
    }

    #[test]
    fn test_garbage_details_decode_to_code_only() {
        let status = tonic::Status::with_details(
            tonic::Code::Internal,
            "x",
            Bytes::from_static(&[0xff, 0x01]),
        );
        assert_eq!(decode_error(&status), StatusError::from_code(Code::Internal));
    }

    #[test]
    fn test_details_survive_header_encoding() {
        let err = StatusError::permission_denied("NoAccess", "admins only");
        let mut headers = http::HeaderMap::new();
        encode_error(&err).add_header(&mut headers).unwrap();

        let status = tonic::Status::from_header_map(&headers).unwrap();
        let back = decode_error(&status);
        assert_eq!(back, err);
        assert_eq!(back.message(), "admins only");
    }
}
