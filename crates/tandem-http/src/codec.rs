//! Request decoding, response encoding and error encoding for the server.
//!
//! All three are plain functions stored in [`HttpServerConfig`](crate::HttpServerConfig)
//! and can be replaced. The defaults resolve codecs through the process-wide
//! registry in `tandem_encoding`.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use tandem_core::StatusError;
use tandem_encoding::{content_subtype, global, Codec, Message};

/// Response type produced by the server.
pub type HttpResponse = Response<Full<Bytes>>;

/// Decodes a request body into the target message.
pub type RequestDecoder =
    Arc<dyn Fn(&HeaderMap, &[u8], &mut dyn Message) -> Result<(), StatusError> + Send + Sync>;

/// Encodes a handler reply into a response.
pub type ResponseEncoder =
    Arc<dyn Fn(&HeaderMap, &dyn Message) -> Result<HttpResponse, StatusError> + Send + Sync>;

/// Encodes a status error into a response. Must not fail.
pub type ErrorEncoder = Arc<dyn Fn(&HeaderMap, &StatusError) -> HttpResponse + Send + Sync>;

/// How the response codec is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Negotiation {
    /// Reply in the request's content type.
    #[default]
    MirrorRequest,
    /// Reply in the first `Accept` entry with a registered codec, else
    /// mirror the request.
    AcceptHeader,
}

impl Negotiation {
    /// Picks the codec for a response to a request with `headers`.
    ///
    /// Falls back to the registry's fallback codec.
    pub fn select(self, headers: &HeaderMap) -> Option<Arc<dyn Codec>> {
        let registry = global();
        if self == Self::AcceptHeader {
            let accepted = headers
                .get_all(ACCEPT)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .filter(|entry| content_subtype(entry).is_some_and(|s| s != "*"))
                .find_map(|entry| registry.for_content_type(Some(entry)));
            if accepted.is_some() {
                return accepted;
            }
        }
        registry
            .for_content_type(content_type(headers))
            .or_else(|| registry.lookup(registry.fallback()))
    }
}

pub(crate) fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Default request decoder.
///
/// The codec is chosen from the request content type. An empty body leaves
/// the target at its default value.
pub fn decode_request(
    headers: &HeaderMap,
    body: &[u8],
    target: &mut dyn Message,
) -> Result<(), StatusError> {
    let ct = content_type(headers);
    let codec = global().for_content_type(ct).ok_or_else(|| {
        StatusError::invalid_argument(
            "CodecNotFound",
            format!("no codec for content type {:?}", ct.unwrap_or_default()),
        )
    })?;
    if body.is_empty() {
        return Ok(());
    }
    codec.unmarshal(body, target).map_err(StatusError::from)
}

/// Builds the default response encoder for `negotiation`.
pub fn response_encoder(negotiation: Negotiation) -> ResponseEncoder {
    Arc::new(move |headers: &HeaderMap, reply: &dyn Message| -> Result<HttpResponse, StatusError> {
        let codec = negotiation.select(headers).ok_or_else(|| {
            StatusError::internal("CodecNotFound", "no codec available for the response")
        })?;
        let body = codec.marshal(reply)?;
        Ok(respond(StatusCode::OK, codec.as_ref(), body))
    })
}

/// Builds the default error encoder for `negotiation`.
///
/// The status comes from the error's code; the body is the marshaled error.
/// If the error cannot be marshaled the response is a bare 500.
pub fn error_encoder(negotiation: Negotiation) -> ErrorEncoder {
    Arc::new(move |headers: &HeaderMap, err: &StatusError| {
        let encoded = negotiation
            .select(headers)
            .map(|codec| codec.marshal(err).map(|body| (codec, body)));
        match encoded {
            Some(Ok((codec, body))) => respond(err.code().http_status(), codec.as_ref(), body),
            Some(Err(e)) => {
                tracing::error!(error = %e, reason = err.reason(), "failed to encode error response");
                bare_500()
            }
            None => bare_500(),
        }
    })
}

fn respond(status: StatusCode, codec: &dyn Codec, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(&codec.content_type()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

pub(crate) fn bare_500() -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
