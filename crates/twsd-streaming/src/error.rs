//! Streaming error types.

use std::time::Duration;

/// Streaming errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed by the remote side.
    #[error("Connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason.
        reason: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP error: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// No data arrived within the read timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// A single line grew past the configured limit.
    #[error("Buffer overflow: {size} bytes exceeds limit of {limit}")]
    BufferOverflow {
        /// Current size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

impl StreamError {
    /// Whether this error is the read-timeout signal rather than a transport failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::ReqwestError(e) => e.is_timeout(),
            Self::IoError(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
