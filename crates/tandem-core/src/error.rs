//! The canonical status error.
//!
//! [`StatusError`] is the only error shape that crosses a tandem protocol
//! boundary. It carries a [`Code`], a short machine-readable `reason`, a
//! human-readable `message` and optional string metadata.
//!
//! # Matching
//!
//! Equality is defined on `(code, reason)` alone. Messages and metadata are
//! diagnostics and never take part in matching, so an error reconstructed on
//! the calling side of a wire compares equal to the one the server produced.
//!
//! Errors are usually wrapped on their way up a call stack. [`StatusError::is`]
//! and [`reason`] walk the [`std::error::Error::source`] chain, so matching works
//! through `anyhow` contexts and custom wrapper types alike.
//!
//! ```
//! use tandem_core::{reason, StatusError};
//!
//! let err = anyhow::Error::new(StatusError::not_found("BookMissing", "no such book"))
//!     .context("loading shelf");
//!
//! assert!(StatusError::not_found("BookMissing", "").is(err.as_ref()));
//! assert_eq!(reason(err.as_ref()), "BookMissing");
//! ```

use std::collections::HashMap;
use std::error::Error as StdError;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Code;

/// Metadata key under which the message travels in structured wire details.
pub const MESSAGE_METADATA_KEY: &str = "message";

/// Result alias for call-level operations.
pub type StatusResult<T> = Result<T, StatusError>;

/// Canonical error value shared by every transport.
///
/// Instances are immutable once built; the `with_*` methods consume and
/// return a new value.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("error: code = {code} reason = {reason} message = {message}")]
pub struct StatusError {
    #[serde(default = "unknown_code")]
    code: Code,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
}

const fn unknown_code() -> Code {
    Code::Unknown
}

macro_rules! status_constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)+) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name(reason: impl Into<String>, message: impl Into<String>) -> Self {
                Self::new(Code::$code, reason, message)
            }
        )+
    };
}

impl StatusError {
    /// Creates a status error with the given code, reason and message.
    #[must_use]
    pub fn new(code: Code, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a status error carrying only a code.
    ///
    /// This is what a decoder produces when the wire carried no structured detail.
    #[must_use]
    pub fn from_code(code: Code) -> Self {
        Self::new(code, String::new(), String::new())
    }

    status_constructors! {
        /// `Canceled` (1): the operation was canceled.
        canceled => Canceled;
        /// `Unknown` (2): an error without a more specific family.
        unknown => Unknown;
        /// `InvalidArgument` (3): the client sent something unacceptable.
        invalid_argument => InvalidArgument;
        /// `DeadlineExceeded` (4): the deadline elapsed before completion.
        deadline_exceeded => DeadlineExceeded;
        /// `NotFound` (5): a requested entity does not exist.
        not_found => NotFound;
        /// `AlreadyExists` (6): the entity to create already exists.
        already_exists => AlreadyExists;
        /// `PermissionDenied` (7): the caller may not perform the operation.
        permission_denied => PermissionDenied;
        /// `ResourceExhausted` (8): a quota or resource ran out.
        resource_exhausted => ResourceExhausted;
        /// `FailedPrecondition` (9): the system is not in the required state.
        failed_precondition => FailedPrecondition;
        /// `Aborted` (10): the operation was aborted.
        aborted => Aborted;
        /// `OutOfRange` (11): the operation went past the valid range.
        out_of_range => OutOfRange;
        /// `Unimplemented` (12): the operation is not implemented.
        unimplemented => Unimplemented;
        /// `Internal` (13): an internal invariant broke.
        internal => Internal;
        /// `Unavailable` (14): the service cannot take the call right now.
        unavailable => Unavailable;
        /// `DataLoss` (15): unrecoverable data loss or corruption.
        data_loss => DataLoss;
        /// `Unauthenticated` (16): the caller presented no valid credentials.
        unauthenticated => Unauthenticated;
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata_map(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns a copy with the code replaced.
    #[must_use]
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = code;
        self
    }

    /// Returns the status code.
    #[must_use]
    pub const fn code(&self) -> Code {
        self.code
    }

    /// Returns the machine-readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the metadata map.
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Reports whether `err`, or any error in its source chain, is a status
    /// error matching `self` by code and reason.
    #[must_use]
    pub fn is(&self, err: &(dyn StdError + 'static)) -> bool {
        find(err).is_some_and(|found| found == self)
    }

    /// Converts an arbitrary error into a status error.
    ///
    /// The first status error found in the source chain wins; anything else
    /// becomes `Unknown` with reason `"Unknown"`.
    #[must_use]
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        match find(err) {
            Some(found) => found.clone(),
            None => Self::unknown("Unknown", format!("Unknown: {err}")),
        }
    }
}

impl Default for StatusError {
    fn default() -> Self {
        Self::from_code(Code::Unknown)
    }
}

impl PartialEq for StatusError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.reason == other.reason
    }
}

impl Eq for StatusError {}

impl Hash for StatusError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.reason.hash(state);
    }
}

impl From<anyhow::Error> for StatusError {
    fn from(err: anyhow::Error) -> Self {
        let err: &(dyn StdError + 'static) = err.as_ref();
        Self::from_error(err)
    }
}

/// Returns the reason of the first status error in `err`'s source chain, or
/// an empty string when there is none.
#[must_use]
pub fn reason<'a>(err: &'a (dyn StdError + 'static)) -> &'a str {
    find(err).map_or("", StatusError::reason)
}

fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a StatusError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<StatusError>() {
            return Some(status);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Error)]
    #[error("wrapped: {inner}")]
    struct Wrapper {
        #[source]
        inner: StatusError,
    }

    #[derive(Debug, Error)]
    #[error("plain failure")]
    struct Plain;

    #[test]
    fn test_constructors_use_family_code() {
        assert_eq!(StatusError::invalid_argument("r", "m").code(), Code::InvalidArgument);
        assert_eq!(StatusError::not_found("r", "m").code(), Code::NotFound);
        assert_eq!(StatusError::unknown("r", "m").code(), Code::Unknown);
        assert_eq!(StatusError::data_loss("r", "m").code(), Code::DataLoss);
        assert_eq!(StatusError::canceled("r", "m").code(), Code::Canceled);
        assert_eq!(StatusError::unauthenticated("r", "m").code(), Code::Unauthenticated);
    }

    #[test]
    fn test_match_ignores_message_and_metadata() {
        let a = StatusError::not_found("Missing", "first").with_metadata("k", "v");
        let b = StatusError::not_found("Missing", "second");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_code_does_not_match() {
        let a = StatusError::new(Code::Canceled, "", "");
        let b = StatusError::new(Code::Unknown, "", "");
        assert_ne!(a, b);
        assert_eq!(StatusError::from_code(Code::Canceled), a);
    }

    #[test]
    fn test_is_walks_source_chain() {
        let wrapped = Wrapper {
            inner: StatusError::permission_denied("NoAccess", "nope"),
        };
        assert!(StatusError::permission_denied("NoAccess", "").is(&wrapped));
        assert!(!StatusError::permission_denied("Other", "").is(&wrapped));
        assert!(!StatusError::unknown("", "").is(&Plain));
    }

    #[test]
    fn test_reason_lookup() {
        let err = StatusError::aborted("test_reason", "m");
        assert_eq!(reason(&err), "test_reason");
        assert_eq!(reason(&Plain), "");

        let any = anyhow::Error::new(err).context("outer").context("outermost");
        assert_eq!(reason(any.as_ref()), "test_reason");
    }

    #[test]
    fn test_reason_borrows_from_the_error() {
        fn first_reason(errors: &[Wrapper]) -> &str {
            errors.first().map_or("", |e| reason(e))
        }

        let errors = vec![Wrapper {
            inner: StatusError::unavailable("Draining", "later"),
        }];
        assert_eq!(first_reason(&errors), "Draining");
        assert_eq!(first_reason(&[]), "");
    }

    #[test]
    fn test_from_error_wraps_foreign_errors_as_unknown() {
        let status = StatusError::from_error(&Plain);
        assert_eq!(status.code(), Code::Unknown);
        assert_eq!(status.reason(), "Unknown");
        assert_eq!(status.message(), "Unknown: plain failure");

        let from_anyhow: StatusError =
            anyhow::Error::new(StatusError::internal("Boom", "x")).into();
        assert_eq!(from_anyhow, StatusError::internal("Boom", ""));
    }

    #[test]
    fn test_display() {
        let err = StatusError::not_found("UserMissing", "user 7");
        assert_eq!(
            err.to_string(),
            "error: code = NOT_FOUND reason = UserMissing message = user 7"
        );
    }

    #[test]
    fn test_json_shape() {
        let err = StatusError::not_found("UserMissing", "user 7").with_metadata("id", "7");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], 5);
        assert_eq!(value["reason"], "UserMissing");
        assert_eq!(value["message"], "user 7");
        assert_eq!(value["metadata"]["id"], "7");

        let bare = serde_json::to_value(StatusError::from_code(Code::Internal)).unwrap();
        assert!(bare.get("metadata").is_none());

        let back: StatusError = serde_json::from_value(value).unwrap();
        assert_eq!(back.message(), "user 7");
        assert_eq!(back.metadata().get("id").map(String::as_str), Some("7"));
    }

    fn any_code() -> impl Strategy<Value = Code> {
        (0..17_i32).prop_map(Code::from_i32_lossy)
    }

    proptest! {
        #[test]
        fn prop_match_iff_code_and_reason_agree(
            code_a in any_code(),
            code_b in any_code(),
            reason_a in "[a-c]{0,2}",
            reason_b in "[a-c]{0,2}",
            message_a in ".{0,8}",
            message_b in ".{0,8}",
        ) {
            let a = StatusError::new(code_a, reason_a.clone(), message_a).with_metadata("x", "1");
            let b = StatusError::new(code_b, reason_b.clone(), message_b);
            prop_assert_eq!(a == b, code_a == code_b && reason_a == reason_b);
            prop_assert_eq!(a.is(&b), code_a == code_b && reason_a == reason_b);
        }
    }
}
