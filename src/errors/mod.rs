//! Centralized error handling for delayq
//!
//! Every failure a caller can branch on is a variant of one of the enums in
//! [`types`]. Validation findings are the exception: the validator reports them
//! through the [`JobLogger`](crate::job_scheduling::JobLogger) and returns a
//! boolean, and `submit` turns that boolean into [`SubmitError::Validation`].
//!
//! # Error Categories
//!
//! - **Submit Errors**: everything `JobSubmitter::submit` and friends can reject with
//! - **Scheduling Errors**: a queue refused to accept a new schedule
//! - **Registry Errors**: queue registration problems at configuration time
//! - **Config Errors**: loading or validating the TOML configuration
//!
//! # Usage
//!
//! ```rust
//! use delayq::errors::{SubmitError, SubmitErrorKind};
//!
//! fn describe(err: &SubmitError) -> &'static str {
//!     match err.kind() {
//!         SubmitErrorKind::Validation => "fix the job fields",
//!         SubmitErrorKind::QueueNotFound | SubmitErrorKind::QueueUnavailable => "check the queue",
//!         SubmitErrorKind::Commit => "storage failed",
//!         SubmitErrorKind::UnknownUnit => "bad delay unit",
//!     }
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for submission results
pub type SubmitResult<T> = Result<T, SubmitError>;

/// Convenience type alias for configuration results
pub type ConfigResult<T> = Result<T, ConfigError>;
