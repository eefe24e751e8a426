//! OAuth 1.0a implementation.
//!
//! Signs user-context requests with HMAC-SHA1 and runs the out-of-band (PIN)
//! three-legged flow used to obtain user tokens.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use sha1::Sha1;
use tracing::debug;
use url::Url;

use crate::{
    OAuthError, OAuthResult, RequestSigner, TWITTER_ACCESS_TOKEN_URL, TWITTER_AUTHORIZATION_URL,
    TWITTER_REQUEST_TOKEN_URL,
};

/// RFC 3986 unreserved characters stay as-is, everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// OAuth 1.0a configuration.
#[derive(Debug, Clone)]
pub struct OAuth1Config {
    /// Consumer key (API key).
    pub consumer_key: String,
    /// Consumer secret (API secret).
    pub consumer_secret: String,
    /// Request token URL.
    pub request_token_url: String,
    /// Authorization URL.
    pub authorization_url: String,
    /// Access token URL.
    pub access_token_url: String,
    /// Callback URL (`oob` when unset, which makes the provider show a PIN).
    pub callback_url: Option<String>,
}

impl OAuth1Config {
    /// Create a new OAuth 1.0a configuration.
    #[must_use]
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        request_token_url: impl Into<String>,
        authorization_url: impl Into<String>,
        access_token_url: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            request_token_url: request_token_url.into(),
            authorization_url: authorization_url.into(),
            access_token_url: access_token_url.into(),
            callback_url: None,
        }
    }

    /// Configuration for Twitter's OAuth 1.0a endpoints.
    #[must_use]
    pub fn twitter(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self::new(
            consumer_key,
            consumer_secret,
            TWITTER_REQUEST_TOKEN_URL,
            TWITTER_AUTHORIZATION_URL,
            TWITTER_ACCESS_TOKEN_URL,
        )
    }

    /// Set callback URL.
    #[must_use]
    pub fn with_callback(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// OAuth 1.0a tokens.
#[derive(Debug, Clone)]
pub struct OAuth1Tokens {
    /// OAuth token.
    pub token: String,
    /// OAuth token secret.
    pub token_secret: String,
    /// User ID (if provided).
    pub user_id: Option<String>,
    /// Screen name (if provided).
    pub screen_name: Option<String>,
}

/// Request token from the initial OAuth 1.0a step.
#[derive(Debug, Clone)]
pub struct RequestToken {
    /// OAuth token.
    pub token: String,
    /// OAuth token secret.
    pub token_secret: String,
    /// Whether the callback was confirmed.
    pub callback_confirmed: bool,
}

/// OAuth 1.0a client for the PIN authorization flow.
#[derive(Debug, Clone)]
pub struct OAuth1Client {
    config: OAuth1Config,
    http_client: Client,
}

impl OAuth1Client {
    /// Create a new OAuth 1.0a client.
    #[must_use]
    pub fn new(config: OAuth1Config) -> Self {
        Self {
            config,
            http_client: Client::new(),
        }
    }

    /// Create with a custom HTTP client.
    #[must_use]
    pub const fn with_http_client(config: OAuth1Config, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Step 1: Get a request token.
    pub async fn get_request_token(&self) -> OAuthResult<RequestToken> {
        let callback = self.config.callback_url.as_deref().unwrap_or("oob");
        let auth_header = self.signing_key(None, "").header(
            "POST",
            &self.config.request_token_url,
            &[],
            &[("oauth_callback", callback)],
            &generate_nonce(),
            &timestamp()?,
        )?;

        debug!(url = %self.config.request_token_url, "Requesting OAuth request token");
        let response = self
            .http_client
            .post(&self.config.request_token_url)
            .header(AUTHORIZATION, auth_header)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchangeFailed(format!(
                "Request token failed ({status}): {text}"
            )));
        }

        let body = response.text().await?;
        parse_request_token(&body)
    }

    /// Step 2: Build the URL the user must visit to obtain a PIN.
    #[must_use]
    pub fn authorization_url(&self, request_token: &RequestToken) -> String {
        format!(
            "{}?oauth_token={}",
            self.config.authorization_url,
            percent_encode(&request_token.token)
        )
    }

    /// Step 3: Exchange the request token and the PIN for an access token.
    pub async fn get_access_token(
        &self,
        request_token: &RequestToken,
        oauth_verifier: &str,
    ) -> OAuthResult<OAuth1Tokens> {
        let auth_header = self
            .signing_key(Some(&request_token.token), &request_token.token_secret)
            .header(
                "POST",
                &self.config.access_token_url,
                &[],
                &[("oauth_verifier", oauth_verifier)],
                &generate_nonce(),
                &timestamp()?,
            )?;

        debug!(url = %self.config.access_token_url, "Exchanging OAuth verifier");
        let response = self
            .http_client
            .post(&self.config.access_token_url)
            .header(AUTHORIZATION, auth_header)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchangeFailed(format!(
                "Access token failed ({status}): {text}"
            )));
        }

        let body = response.text().await?;
        parse_access_token(&body)
    }

    /// Get configuration.
    #[must_use]
    pub const fn config(&self) -> &OAuth1Config {
        &self.config
    }

    fn signing_key<'a>(&'a self, token: Option<&'a str>, token_secret: &'a str) -> SigningKey<'a> {
        SigningKey {
            consumer_key: &self.config.consumer_key,
            consumer_secret: &self.config.consumer_secret,
            token,
            token_secret,
        }
    }
}

/// Signs requests on behalf of one user of one consumer application.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl OAuth1Signer {
    /// Create a signer from consumer and user credentials.
    #[must_use]
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        token: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: token.into(),
            token_secret: token_secret.into(),
        }
    }

    /// Consumer key this signer uses.
    #[must_use]
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// User token this signer uses.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Sign with an explicit nonce and timestamp.
    pub fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> OAuthResult<String> {
        SigningKey {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token: Some(&self.token),
            token_secret: &self.token_secret,
        }
        .header(method, url, params, &[], nonce, timestamp)
    }
}

impl fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("token", &self.token)
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

impl RequestSigner for OAuth1Signer {
    fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> OAuthResult<String> {
        self.sign_with(method, url, params, &generate_nonce(), &timestamp()?)
    }
}

struct SigningKey<'a> {
    consumer_key: &'a str,
    consumer_secret: &'a str,
    token: Option<&'a str>,
    token_secret: &'a str,
}

impl SigningKey<'_> {
    /// Build the `Authorization` header value.
    fn header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        protocol_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> OAuthResult<String> {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.into()),
            ("oauth_nonce".into(), nonce.into()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp.into()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = self.token {
            oauth_params.push(("oauth_token".into(), token.into()));
        }
        oauth_params.extend(
            protocol_params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        );

        let signature = self.signature(method, url, &oauth_params, params)?;
        oauth_params.push(("oauth_signature".into(), signature));
        oauth_params.sort();

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }

    /// Calculate the HMAC-SHA1 signature over method, base URL and every parameter.
    fn signature(
        &self,
        method: &str,
        url: &str,
        oauth_params: &[(String, String)],
        params: &[(String, String)],
    ) -> OAuthResult<String> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| OAuthError::SignatureError(format!("URL without host: {url}")))?;
        let base_url = match parsed_url.port() {
            Some(port) => format!(
                "{}://{host}:{port}{}",
                parsed_url.scheme(),
                parsed_url.path()
            ),
            None => format!("{}://{host}{}", parsed_url.scheme(), parsed_url.path()),
        };

        let mut pairs: Vec<(String, String)> = oauth_params
            .iter()
            .chain(params)
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        pairs.extend(
            parsed_url
                .query_pairs()
                .map(|(k, v)| (percent_encode(&k), percent_encode(&v))),
        );
        pairs.sort();

        let param_string = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let signature_base = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(&base_url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(self.token_secret)
        );

        let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
            .map_err(|e| OAuthError::SignatureError(e.to_string()))?;
        mac.update(signature_base.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Parse request token response.
fn parse_request_token(body: &str) -> OAuthResult<RequestToken> {
    let params: std::collections::HashMap<String, String> = serde_urlencoded::from_str(body)
        .map_err(|e| OAuthError::InvalidTokenResponse(e.to_string()))?;

    let token = params
        .get("oauth_token")
        .ok_or_else(|| OAuthError::InvalidTokenResponse("Missing oauth_token".into()))?
        .clone();

    let token_secret = params
        .get("oauth_token_secret")
        .ok_or_else(|| OAuthError::InvalidTokenResponse("Missing oauth_token_secret".into()))?
        .clone();

    let callback_confirmed = params
        .get("oauth_callback_confirmed")
        .is_some_and(|v| v == "true");

    Ok(RequestToken {
        token,
        token_secret,
        callback_confirmed,
    })
}

/// Parse access token response.
fn parse_access_token(body: &str) -> OAuthResult<OAuth1Tokens> {
    let params: std::collections::HashMap<String, String> = serde_urlencoded::from_str(body)
        .map_err(|e| OAuthError::InvalidTokenResponse(e.to_string()))?;

    let token = params
        .get("oauth_token")
        .ok_or_else(|| OAuthError::InvalidTokenResponse("Missing oauth_token".into()))?
        .clone();

    let token_secret = params
        .get("oauth_token_secret")
        .ok_or_else(|| OAuthError::InvalidTokenResponse("Missing oauth_token_secret".into()))?
        .clone();

    Ok(OAuth1Tokens {
        token,
        token_secret,
        user_id: params.get("user_id").cloned(),
        screen_name: params.get("screen_name").cloned(),
    })
}

fn timestamp() -> OAuthResult<String> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .map_err(|e| OAuthError::SignatureError(format!("Failed to get timestamp: {e}")))
}

/// Generate a random nonce.
fn generate_nonce() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Percent-encode a string per RFC 3986.
fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}
