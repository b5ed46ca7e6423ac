//! Field names used on events emitted by the adapters and middleware.

/// Transport the call arrived on (`GRPC` or `HTTP`).
pub const TRANSPORT: &str = "transport";

/// Full gRPC method or `METHOD /template` route.
pub const OPERATION: &str = "operation";

/// Request id attached to the call context.
pub const REQUEST_ID: &str = "request_id";

/// Numeric status code of the call, `0` on success.
pub const CODE: &str = "code";

/// Status error reason.
pub const REASON: &str = "reason";

/// Call latency in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Rendered error.
pub const ERROR: &str = "error";

/// Panic payload of a recovered call.
pub const PANIC: &str = "panic";

/// Captured backtrace of a recovered call.
pub const BACKTRACE: &str = "backtrace";

/// Logging middleware tag, e.g. `server` or `client`.
pub const COMPONENT: &str = "component";

/// Service name recorded at startup.
pub const SERVICE: &str = "service";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_distinct() {
        let names = [
            TRANSPORT, OPERATION, REQUEST_ID, CODE, REASON, DURATION_MS, ERROR, PANIC, BACKTRACE,
            COMPONENT, SERVICE,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
