//! Downloader error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use twsd_oauth::OAuthError;
use twsd_streaming::StreamError;

/// Output file errors. Always fatal: capture cannot continue without persistence.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The output file could not be opened or created.
    #[error("Failed to open {path}: {source}")]
    Open {
        /// Output file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A line could not be written or synced.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Output file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Downloader errors.
#[derive(Error, Debug)]
pub enum TwsdError {
    /// Transport failure or read timeout on the streaming connection.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Persisting a line failed.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Signing a request or handling credentials failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid arguments or settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TwsdError {
    /// Check if this error is the read-timeout signal.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_timeout(),
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if the crawler must stop instead of reconnecting.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Sink(_) | Self::OAuth(_) | Self::Config(_))
    }
}

/// Result type for downloader operations.
pub type TwsdResult<T> = Result<T, TwsdError>;
