//! Streaming sessions.
//!
//! A session is one signed POST to a Streaming API method whose response body
//! is consumed line by line until it ends, fails or goes quiet for longer than
//! the read timeout.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use tracing::{debug, instrument};
use twsd_oauth::RequestSigner;
use twsd_streaming::{ByteStreamExt, StreamError, StreamResult};

use crate::config::{DEFAULT_STREAM_URL, SessionParams};
use crate::error::TwsdResult;

/// Lines of one session, ending with a timeout, a transport error or end of body.
pub type LineStream = BoxStream<'static, StreamResult<Vec<u8>>>;

/// Opens streaming sessions.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open a session for `params`.
    async fn open(&self, params: &SessionParams) -> TwsdResult<LineStream>;
}

/// Streaming API over HTTP, signed with OAuth 1.0a.
#[derive(Debug, Clone)]
pub struct HttpStreamSource {
    client: Client,
    signer: Arc<dyn RequestSigner>,
    stream_url: String,
}

impl HttpStreamSource {
    /// Create a source for the public Streaming API.
    pub fn new(signer: Arc<dyn RequestSigner>) -> TwsdResult<Self> {
        let client = Client::builder()
            .user_agent(format!("twsd/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            signer,
            stream_url: DEFAULT_STREAM_URL.to_string(),
        })
    }

    /// Use a different base URL.
    #[must_use]
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of a session's endpoint.
    #[must_use]
    pub fn endpoint_url(&self, params: &SessionParams) -> String {
        format!(
            "{}/1.1/statuses/{}.json",
            self.stream_url,
            params.endpoint()
        )
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    #[instrument(skip(self, params), fields(endpoint = %params.endpoint()))]
    async fn open(&self, params: &SessionParams) -> TwsdResult<LineStream> {
        let url = self.endpoint_url(params);
        let form = params.form();
        let authorization = self.signer.authorization("POST", &url, &form)?;

        let request = self
            .client
            .post(&url)
            .header("Authorization", authorization)
            .form(&form)
            .send();

        let timeout = params.timeout();
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| StreamError::Timeout(timeout))?
            .map_err(StreamError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = tokio::time::timeout(timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(StreamError::HttpError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        debug!(status = status.as_u16(), "Stream connected");

        Ok(response
            .bytes_stream()
            .with_timeout(timeout)
            .lines()
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::error::TwsdError;
    use crate::pipeline::MessagePipeline;
    use crate::sink::RotatingSink;
    use crate::sink::tests::{ManualClock, day};
    use std::time::Duration;
    use twsd_oauth::OAuth1Signer;
    use wiremock::matchers::{body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpStreamSource {
        let signer = OAuth1Signer::new("ck", "cs", "tok", "ts");
        HttpStreamSource::new(Arc::new(signer))
            .unwrap()
            .with_stream_url(server.uri())
    }

    #[test]
    fn test_endpoint_url() {
        let signer = OAuth1Signer::new("ck", "cs", "tok", "ts");
        let source = HttpStreamSource::new(Arc::new(signer)).unwrap();

        assert_eq!(
            source.endpoint_url(&SessionParams::new(Endpoint::Sample)),
            "https://stream.twitter.com/1.1/statuses/sample.json"
        );

        let source = source.with_stream_url("http://localhost:8080/");
        assert_eq!(
            source.endpoint_url(&SessionParams::new(Endpoint::Firehose)),
            "http://localhost:8080/1.1/statuses/firehose.json"
        );
    }

    #[tokio::test]
    async fn test_open_streams_lines() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(header_regex("Authorization", r#"^OAuth .*oauth_token="tok""#))
            .and(body_string_contains("track=rust"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("{\"id\":1}\r\n\r\n{\"id\":2}\r\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = SessionParams::new(Endpoint::Filter).with_param("track", "rust");
        let lines: Vec<_> = source(&server)
            .open(&params)
            .await
            .unwrap()
            .collect()
            .await;

        let lines: Vec<_> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            lines,
            vec![b"{\"id\":1}".to_vec(), Vec::new(), b"{\"id\":2}".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_undecodable_bytes_reach_disk_unchanged() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"{\"t\":\"a\xffb\"}\n".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut sink = RotatingSink::with_clock(
            dir.path().join("out").to_string_lossy(),
            ManualClock::new(day(2024, 1, 1)),
        );
        let lines = source(&server)
            .open(&SessionParams::new(Endpoint::Sample))
            .await
            .unwrap();
        let parsed = MessagePipeline::new(lines, &mut sink).count().await;

        assert_eq!(parsed, 0);
        assert_eq!(
            std::fs::read(dir.path().join("out_20240101.json")).unwrap(),
            b"{\"t\":\"a\xffb\"}\n"
        );
    }

    #[tokio::test]
    async fn test_open_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.1/statuses/sample.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = source(&server)
            .open(&SessionParams::new(Endpoint::Sample))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            TwsdError::Stream(StreamError::HttpError { status: 401, ref message })
                if message == "Unauthorized"
        ));
        assert!(!err.is_fatal());
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_open_times_out_waiting_for_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let params = SessionParams::new(Endpoint::Sample).with_timeout(Duration::from_millis(200));
        let err = source(&server).open(&params).await.err().unwrap();

        assert!(err.is_timeout());
    }
}
