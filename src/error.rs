//! Error types for the fetch bridge.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error type
//! [`BridgeError`] covers the whole failure taxonomy:
//!
//! | Class | Variants | Handling |
//! |-------|----------|----------|
//! | Transient | [`Transport`], [`Timeout`], [`Http`] with 429/5xx | retried with backoff |
//! | Terminal HTTP | [`Http`] with any other status | surfaced immediately |
//! | Cancellation | [`Cancelled`] | never retried, carries the reason |
//! | Invalid handle | [`InvalidHandle`] | surfaced immediately |
//!
//! Failures while tearing a session down are swallowed and never reach this type.
//!
//! [`Transport`]: BridgeError::Transport
//! [`Timeout`]: BridgeError::Timeout
//! [`Http`]: BridgeError::Http
//! [`Cancelled`]: BridgeError::Cancelled
//! [`InvalidHandle`]: BridgeError::InvalidHandle

use crate::client::is_retryable_status;
use crate::signal::CancelReason;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors produced while fetching, streaming or managing handles.
///
/// `Clone` so a captured read-ahead failure can be handed out on every
/// subsequent read and copied into the host's error slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} {status_text}")]
    Http {
        /// Numeric status code
        status: u16,
        /// Reason phrase, empty when unknown
        status_text: String,
    },

    /// The request or body stream failed below HTTP.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// A cancellation source tripped while the operation was outstanding.
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// The handle is unknown or already closed.
    #[error("Invalid handle: {0}")]
    InvalidHandle(i32),

    /// The target could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The handle counter ran out of positive ids.
    #[error("Handle space exhausted")]
    HandlesExhausted,

    /// The task filling the read-ahead slot died without a result.
    #[error("Read-ahead failed: {0}")]
    ReadAhead(String),

    /// The blocking runtime could not be created.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Build an HTTP error from a status code, filling in the canonical reason.
    pub fn http(status: u16) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        BridgeError::Http {
            status,
            status_text,
        }
    }

    /// Whether the retry policy may try again after this error.
    ///
    /// Cancellation is never retryable, whatever caused it.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Transport(_) | BridgeError::Timeout(_) => true,
            BridgeError::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Whether this error reports an abort rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BridgeError::Cancelled(_))
    }

    /// The HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The cancellation reason carried by the error, if any.
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            BridgeError::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BridgeError::Timeout(e.to_string())
        } else {
            BridgeError::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(e: url::ParseError) -> Self {
        BridgeError::InvalidUrl(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = BridgeError::http(404);
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_unknown_status_has_empty_text() {
        let err = BridgeError::http(599);
        assert_eq!(err.to_string(), "HTTP 599 ");
    }

    #[test]
    fn test_retry_classification() {
        assert!(BridgeError::http(503).is_retryable());
        assert!(BridgeError::http(429).is_retryable());
        assert!(!BridgeError::http(404).is_retryable());
        assert!(BridgeError::Transport("reset".into()).is_retryable());
        assert!(!BridgeError::Cancelled(CancelReason::Aborted).is_retryable());
        assert!(!BridgeError::InvalidHandle(3).is_retryable());
    }

    #[test]
    fn test_cancellation_keeps_reason() {
        let err = BridgeError::Cancelled(CancelReason::HandleClosed);
        assert!(err.is_cancellation());
        assert_eq!(err.cancel_reason(), Some(&CancelReason::HandleClosed));
    }
}
