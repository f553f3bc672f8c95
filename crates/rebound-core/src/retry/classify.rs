//! Classify attempt errors, transport errors and HTTP status codes for retry decisions.

use super::error::AttemptError;
use std::io;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation was cancelled or its deadline expired.
    Cancelled,
    /// Operation explicitly marked the failure as retryable.
    Marked,
    /// Transient network failure (DNS hiccup, empty reply, would block).
    Temporary,
    /// Operation timed out (connect/read).
    Timeout,
    /// Peer refused the connection.
    ConnectionRefused,
    /// Peer reset the connection or the transfer broke mid-stream.
    ConnectionReset,
    /// Any other error (not retried).
    Other,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::Marked
            | ErrorKind::Temporary
            | ErrorKind::Timeout
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset => true,
            ErrorKind::Cancelled | ErrorKind::Other => false,
        }
    }
}

/// Transport-level judgment for an operation's error type.
///
/// Implement this for the error type a retried operation returns. The default
/// treats every error as `Other`, so `impl Classify for MyError {}` opts into
/// "retry only what is explicitly marked".
pub trait Classify {
    fn error_kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn error_kind(&self) -> ErrorKind {
        (**self).error_kind()
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn error_kind(&self) -> ErrorKind {
        (**self).error_kind()
    }
}

impl Classify for io::Error {
    fn error_kind(&self) -> ErrorKind {
        match self.kind() {
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => ErrorKind::Temporary,
            io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
            _ => ErrorKind::Other,
        }
    }
}

impl Classify for curl::Error {
    fn error_kind(&self) -> ErrorKind {
        if self.is_operation_timedout() {
            return ErrorKind::Timeout;
        }
        if self.is_couldnt_resolve_host() || self.is_couldnt_resolve_proxy() || self.is_got_nothing() {
            return ErrorKind::Temporary;
        }
        if self.is_couldnt_connect() {
            return ErrorKind::ConnectionRefused;
        }
        if self.is_send_error() || self.is_recv_error() {
            return ErrorKind::ConnectionReset;
        }
        ErrorKind::Other
    }
}

impl Classify for sqlx::Error {
    fn error_kind(&self) -> ErrorKind {
        match self {
            sqlx::Error::PoolTimedOut => ErrorKind::Timeout,
            sqlx::Error::Io(e) => e.error_kind(),
            _ => ErrorKind::Other,
        }
    }
}

/// Classify one attempt's error. First match wins:
/// cancellation, explicit marker, then the cause's transport kind.
pub fn classify<E: Classify>(err: &AttemptError<E>) -> ErrorKind {
    match err {
        AttemptError::Cancelled(_) => ErrorKind::Cancelled,
        AttemptError::Retryable(_) => ErrorKind::Marked,
        AttemptError::Failed(e) => e.error_kind(),
    }
}

/// Whether the executor would retry after `err`.
pub fn is_retryable<E: Classify>(err: &AttemptError<E>) -> bool {
    classify(err).is_retryable()
}

/// Whether an HTTP status indicates a transient server-side condition:
/// 408, 429, 500, 502, 503 or 504.
pub fn is_retryable_http_status(code: u32) -> bool {
    matches!(code, 408 | 429 | 500 | 502 | 503 | 504)
}
