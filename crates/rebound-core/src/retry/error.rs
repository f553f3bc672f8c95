//! Per-attempt and terminal error types for the retry executor.

use super::cancel::CancelCause;
use std::fmt;

/// Failure reported by one invocation of a retried operation.
///
/// The variant is the retryability tag: classification looks at it first and
/// only inspects the cause for `Failed`.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The operation marked this failure as transient; always retried.
    Retryable(E),
    /// The operation observed cancellation and gave up; never retried.
    Cancelled(CancelCause),
    /// Plain failure, classified from the cause.
    Failed(E),
}

impl<E> AttemptError<E> {
    pub fn retryable(cause: E) -> Self {
        AttemptError::Retryable(cause)
    }

    pub fn cause(&self) -> Option<&E> {
        match self {
            AttemptError::Retryable(e) | AttemptError::Failed(e) => Some(e),
            AttemptError::Cancelled(_) => None,
        }
    }

    pub fn into_cause(self) -> Option<E> {
        match self {
            AttemptError::Retryable(e) | AttemptError::Failed(e) => Some(e),
            AttemptError::Cancelled(_) => None,
        }
    }
}

impl<E> From<E> for AttemptError<E> {
    fn from(cause: E) -> Self {
        AttemptError::Failed(cause)
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Retryable(e) | AttemptError::Failed(e) => write!(f, "{}", e),
            AttemptError::Cancelled(cause) => write!(f, "operation {}", cause),
        }
    }
}

impl<E> std::error::Error for AttemptError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Retryable(e) | AttemptError::Failed(e) => Some(e),
            AttemptError::Cancelled(cause) => Some(cause),
        }
    }
}

/// Why a run ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NonRetryable,
    Exhausted,
    Cancelled,
}

/// Terminal failure of a retry run. Every variant carries the last attempt's
/// error and the number of invocations performed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made.
    NonRetryable { attempts: u32, last: AttemptError<E> },
    /// Every permitted attempt failed retryably.
    Exhausted { attempts: u32, last: AttemptError<E> },
    /// The cancellation signal fired during a backoff wait.
    Cancelled {
        attempts: u32,
        cause: CancelCause,
        last: AttemptError<E>,
    },
}

impl<E> RetryError<E> {
    pub fn reason(&self) -> FailureReason {
        match self {
            RetryError::NonRetryable { .. } => FailureReason::NonRetryable,
            RetryError::Exhausted { .. } => FailureReason::Exhausted,
            RetryError::Cancelled { .. } => FailureReason::Cancelled,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &AttemptError<E> {
        match self {
            RetryError::NonRetryable { last, .. }
            | RetryError::Exhausted { last, .. }
            | RetryError::Cancelled { last, .. } => last,
        }
    }

    pub fn into_last_error(self) -> AttemptError<E> {
        match self {
            RetryError::NonRetryable { last, .. }
            | RetryError::Exhausted { last, .. }
            | RetryError::Cancelled { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::NonRetryable { last, .. } => write!(f, "not retryable: {}", last),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
            RetryError::Cancelled { cause, last, .. } => write!(f, "{}: {}", cause, last),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last_error())
    }
}
