//! Per-call context.
//!
//! A [`CallContext`] is created by a transport adapter when a call reaches the
//! dispatch boundary and is passed by value through every middleware into the
//! terminal handler. It records which transport served the call and carries the
//! transport's own view of the call (headers, method name, route variables)
//! behind a typed accessor.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for each call, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one process sortable by id.
///
/// ```
/// use tandem_core::RequestId;
///
/// let id = RequestId::new();
/// assert_ne!(id, RequestId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID, for ids propagated from an upstream caller.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier chosen when a service registers per-service middleware.
///
/// Services are keyed by this value rather than by any handler identity, so two
/// registrations that use the same id share one middleware chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    /// Creates a service id.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Which wire protocol served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportKind {
    /// The binary RPC protocol (gRPC).
    Grpc,
    /// HTTP with codec-negotiated bodies.
    Http,
}

impl TransportKind {
    /// Returns `"GRPC"` or `"HTTP"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "GRPC",
            Self::Http => "HTTP",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context that flows through the middleware chain for one call.
///
/// Adapters attach exactly one [`TransportKind`] and one protocol-specific
/// server-info value before any middleware runs. Attaching again replaces the
/// previous value, so readers always see the most recent one.
///
/// ```
/// use tandem_core::{CallContext, TransportKind};
///
/// #[derive(Debug)]
/// struct Info { method: &'static str }
///
/// let ctx = CallContext::new()
///     .with_transport(TransportKind::Http)
///     .with_server_info(Info { method: "GET" });
///
/// assert_eq!(ctx.transport(), Some(TransportKind::Http));
/// assert_eq!(ctx.server_info::<Info>().map(|i| i.method), Some("GET"));
/// assert!(ctx.server_info::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct CallContext {
    request_id: RequestId,
    transport: Option<TransportKind>,
    server_info: Option<Arc<dyn Any + Send + Sync>>,
    operation: Option<Arc<str>>,
    deadline: Option<Instant>,
    started_at: Instant,
}

impl CallContext {
    /// Creates an empty context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates an empty context with the given request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            transport: None,
            server_info: None,
            operation: None,
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Attaches the transport kind.
    #[must_use]
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.transport = Some(kind);
        self
    }

    /// Attaches the protocol-specific server information.
    #[must_use]
    pub fn with_server_info<T: Any + Send + Sync>(mut self, info: T) -> Self {
        self.server_info = Some(Arc::new(info));
        self
    }

    /// Records the operation name used in logs (a full RPC method or an HTTP route).
    #[must_use]
    pub fn with_operation(mut self, operation: impl AsRef<str>) -> Self {
        self.operation = Some(Arc::from(operation.as_ref()));
        self
    }

    /// Sets an absolute deadline. An earlier deadline already present is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now, keeping any earlier deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the transport that served the call, if one was attached.
    #[must_use]
    pub const fn transport(&self) -> Option<TransportKind> {
        self.transport
    }

    /// Returns the attached server information if it is of type `T`.
    #[must_use]
    pub fn server_info<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.server_info.as_deref()?.downcast_ref::<T>()
    }

    /// Returns the operation name, if recorded.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left until the deadline.
    ///
    /// `None` means no deadline; an elapsed deadline yields `Some(Duration::ZERO)`.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("request_id", &self.request_id)
            .field("transport", &self.transport)
            .field("server_info", &self.server_info.is_some())
            .field("operation", &self.operation)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct RpcInfo {
        full_method: String,
    }

    #[test]
    fn test_empty_context_has_no_transport() {
        let ctx = CallContext::new();
        assert_eq!(ctx.transport(), None);
        assert!(ctx.server_info::<RpcInfo>().is_none());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_most_recent_attachment_wins() {
        let ctx = CallContext::new()
            .with_transport(TransportKind::Grpc)
            .with_server_info(RpcInfo {
                full_method: "/a.A/One".into(),
            })
            .with_transport(TransportKind::Http)
            .with_server_info(RpcInfo {
                full_method: "/a.A/Two".into(),
            });

        assert_eq!(ctx.transport(), Some(TransportKind::Http));
        assert_eq!(
            ctx.server_info::<RpcInfo>().map(|i| i.full_method.as_str()),
            Some("/a.A/Two")
        );
    }

    #[test]
    fn test_clone_shares_server_info() {
        let ctx = CallContext::new().with_server_info(RpcInfo {
            full_method: "/x".into(),
        });
        let cloned = ctx.clone();
        assert_eq!(ctx.request_id(), cloned.request_id());
        assert_eq!(cloned.server_info::<RpcInfo>(), ctx.server_info::<RpcInfo>());
    }

    #[test]
    fn test_earlier_deadline_is_kept() {
        let now = Instant::now();
        let ctx = CallContext::new()
            .with_deadline(now + Duration::from_millis(100))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(100)));

        let ctx = ctx.with_deadline(now + Duration::from_millis(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_millis(10)));
    }

    #[test]
    fn test_elapsed_deadline_has_zero_remaining() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_transport_kind_names() {
        assert_eq!(TransportKind::Grpc.to_string(), "GRPC");
        assert_eq!(TransportKind::Http.as_str(), "HTTP");
        assert_eq!(serde_json::to_string(&TransportKind::Grpc).unwrap(), "\"GRPC\"");
    }

    #[test]
    fn test_service_id_conversions() {
        let a = ServiceId::from("greeter");
        let b = ServiceId::from(String::from("greeter"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "greeter");
        assert_eq!(a.to_string(), "greeter");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(RequestId::from_uuid(*a.as_uuid()), a);
    }
}
