//! twsd OAuth - OAuth 1.0a support for the stream downloader
//!
//! - **Signing**: HMAC-SHA1 `Authorization` headers for user-context requests
//! - **PIN authorization**: the out-of-band three-legged flow
//! - **Keychain**: on-disk storage for consumer and user credentials
//!
//! The ingestion core only sees the [`RequestSigner`] trait; where the secrets
//! come from is the caller's business.
//!
//! ```rust,ignore
//! use twsd_oauth::{Keychain, RequestSigner};
//!
//! let keychain = Keychain::load("~/.twsd.auth")?;
//! let signer = keychain.signer(None)?;
//! let header = signer.authorization("POST", url, &[("track".into(), "rust".into())])?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod keychain;
mod oauth1;

pub use error::*;
pub use keychain::*;
pub use oauth1::*;

/// Twitter request-token endpoint.
pub const TWITTER_REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";

/// Twitter user authorization page.
pub const TWITTER_AUTHORIZATION_URL: &str = "https://api.twitter.com/oauth/authorize";

/// Twitter access-token endpoint.
pub const TWITTER_ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";

/// Produces `Authorization` header values for outgoing requests.
pub trait RequestSigner: Send + Sync + std::fmt::Debug {
    /// Sign a request.
    ///
    /// `params` are the form-encoded body parameters; query parameters are
    /// read from `url`. Both take part in the signature.
    fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> OAuthResult<String>;
}
