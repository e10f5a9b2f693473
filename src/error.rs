//! Error types for http-batch
//!
//! This module provides the error handling for the library:
//! - [`Error`] - crate-wide error returned by the public API (admission, configuration, I/O)
//! - [`ExecutorError`] - failures reported by an [`HttpExecutor`](crate::executor::HttpExecutor)
//!   for a single HTTP call, classified as recoverable or permanent by
//!   [`IsRetryable`](crate::retry::IsRetryable)

use std::time::Duration;
use thiserror::Error;

/// Result type alias for http-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for http-batch
///
/// Task-level failures never surface here: they are recorded on the task itself.
/// Callers only see admission errors, misuse and setup failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue.num_workers")
        key: Option<String>,
    },

    /// The pool is not running, so it cannot accept work
    #[error("batch processor is not running")]
    NotRunning,

    /// The intake queue is at capacity and the queue policy rejects instead of waiting
    #[error("intake queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured capacity of the intake queue
        capacity: usize,
    },

    /// The intake queue was closed while a submission was in progress
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// A request descriptor could not be built (unknown method, bad endpoint)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Executor could not be created for a worker
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while building an HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error tied to a specific key
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error is an admission error (the submission was refused)
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            Error::NotRunning | Error::QueueFull { .. } | Error::ShuttingDown
        )
    }
}

/// Errors reported by an HTTP executor for a single call
///
/// Whether a variant is worth retrying is decided by
/// [`IsRetryable`](crate::retry::IsRetryable).
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The request did not finish within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Could not connect to the remote host
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered with a 5xx status
    #[error("server error: HTTP {status}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body, if any was readable
        body: Option<String>,
    },

    /// The server answered with a 4xx status
    #[error("client error: HTTP {status}")]
    ClientError {
        /// HTTP status code
        status: u16,
        /// Response body, if any was readable
        body: Option<String>,
    },

    /// The request could not be built (malformed URL, unserializable body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport-level failure (reset connection, truncated body)
    #[error("transport error: {0}")]
    Transport(String),
}

impl ExecutorError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecutorError::ServerError { status, .. } | ExecutorError::ClientError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Classify a non-success HTTP status into a client or server error
    pub fn from_status(status: u16, body: Option<String>) -> Self {
        if status >= 500 {
            ExecutorError::ServerError { status, body }
        } else {
            ExecutorError::ClientError { status, body }
        }
    }
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ExecutorError::InvalidRequest(e.to_string())
        } else if e.is_connect() {
            ExecutorError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            ExecutorError::from_status(status.as_u16(), None)
        } else {
            ExecutorError::Transport(e.to_string())
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_errors_are_classified() {
        assert!(Error::NotRunning.is_admission());
        assert!(Error::QueueFull { capacity: 10 }.is_admission());
        assert!(Error::ShuttingDown.is_admission());
        assert!(!Error::InvalidRequest("bad".into()).is_admission());
        assert!(!Error::config("queue.num_workers", "must be > 0").is_admission());
    }

    #[test]
    fn config_error_keeps_key() {
        match Error::config("retry.max_retries", "must be at least 1") {
            Error::Config { message, key } => {
                assert_eq!(key.as_deref(), Some("retry.max_retries"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn from_status_splits_client_and_server_errors() {
        assert!(matches!(
            ExecutorError::from_status(503, None),
            ExecutorError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ExecutorError::from_status(404, Some("missing".into())),
            ExecutorError::ClientError { status: 404, .. }
        ));
        assert_eq!(ExecutorError::from_status(500, None).status(), Some(500));
        assert_eq!(ExecutorError::Connection("refused".into()).status(), None);
    }

    #[test]
    fn display_messages_are_lowercase_and_informative() {
        assert_eq!(
            Error::QueueFull { capacity: 1000 }.to_string(),
            "intake queue is full (capacity 1000)"
        );
        assert_eq!(
            ExecutorError::ServerError {
                status: 502,
                body: None
            }
            .to_string(),
            "server error: HTTP 502"
        );
    }
}
