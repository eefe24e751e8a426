//! OAuth error types.

use std::path::PathBuf;

/// OAuth errors.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Invalid client configuration.
    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    /// Token exchange failed.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Invalid token response.
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// OAuth 1.0a signature error.
    #[error("OAuth 1.0a signature error: {0}")]
    SignatureError(String),

    /// The keychain has no consumer key/secret pair.
    #[error("No consumer credentials in keychain")]
    MissingConsumer,

    /// The keychain has no user token/secret pair.
    #[error("No user credentials in keychain")]
    NoUserCredentials,

    /// No user credentials stored under this label.
    #[error("No user credentials labelled {0:?}")]
    UnknownLabel(String),

    /// Reading or writing the credential file failed.
    #[error("Credential file {path}: {source}")]
    IoError {
        /// Credential file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),
}

impl OAuthError {
    /// Whether this error means the credential file does not exist yet.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IoError { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
