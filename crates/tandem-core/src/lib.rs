//! # Tandem Core
//!
//! Core types shared by every tandem transport.
//!
//! This crate provides the foundational types used throughout tandem:
//!
//! - [`StatusError`] - Canonical error (code, reason, message, metadata) that
//!   survives both the gRPC and the HTTP wire
//! - [`Code`] - Canonical status codes, shared with gRPC, plus the HTTP status table
//! - [`CallContext`] - Per-call context carrying the transport kind and the
//!   protocol-specific server information
//! - [`RecoveryHandler`] - Converts a contained panic into a [`StatusError`]
//!
//! ## Matching errors
//!
//! Two status errors are the same error when their code and reason agree; the
//! message and metadata are diagnostics only.
//!
//! ```
//! use tandem_core::StatusError;
//!
//! let a = StatusError::not_found("UserMissing", "user 42 does not exist");
//! let b = StatusError::not_found("UserMissing", "another message");
//! assert_eq!(a, b);
//! ```

#![doc(html_root_url = "https://docs.rs/tandem-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod code;
mod context;
mod error;
pub mod recovery;

pub use code::{Code, InvalidCode};
pub use context::{CallContext, RequestId, ServiceId, TransportKind};
pub use error::{reason, StatusError, StatusResult, MESSAGE_METADATA_KEY};
pub use recovery::{catch_panic, default_recovery_handler, PanicReport, RecoveryHandler};
