//! Retry executor with exponential backoff.
//!
//! This module holds the policy, the backoff curve, error classification
//! (cancellation, explicit markers, transport failures, HTTP statuses), the
//! cancellation signal and the attempt loop, so that callers such as the HTTP
//! and order wrappers share one consistent retry behaviour.

mod backoff;
mod cancel;
mod classify;
mod error;
mod policy;
mod run;

pub use backoff::{compute_wait, exponential_wait};
pub use cancel::{CancelCause, Cancellation};
pub use classify::{classify, is_retryable, is_retryable_http_status, Classify, ErrorKind};
pub use error::{AttemptError, FailureReason, RetryError};
pub use policy::{PolicyError, RetryPolicy};
pub use run::{run, run_with, run_with_notify};
