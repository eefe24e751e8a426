//! The reconnect loop.
//!
//! A [`Crawler`] opens a session, drains it through the message pipeline and
//! reconnects after a fixed delay whenever the session ends: read timeouts,
//! transport failures and a cleanly closed body are all retried. Only a
//! persistence or configuration failure stops it, or the shutdown future.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;

use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use twsd_streaming::{ReconnectConfig, ReconnectHandler, StreamError};

use crate::config::SessionParams;
use crate::error::{TwsdError, TwsdResult};
use crate::pipeline::MessagePipeline;
use crate::session::StreamSource;
use crate::sink::RotatingSink;

/// Messages between two throughput reports.
pub const DEFAULT_REPORT_EVERY: u64 = 1000;

/// Crawler behavior that does not affect what is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Report throughput every this many messages (0 disables reports).
    pub report_every: u64,
    /// Print each message to stdout.
    pub echo: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            report_every: DEFAULT_REPORT_EVERY,
            echo: false,
        }
    }
}

impl CrawlerConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the throughput report interval.
    #[must_use]
    pub const fn with_report_every(mut self, messages: u64) -> Self {
        self.report_every = messages;
        self
    }

    /// Print each message to stdout.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

/// Where the crawler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlerState {
    /// Opening a session.
    Connecting,
    /// Reading messages.
    Streaming,
    /// The last session went quiet; waiting to reconnect.
    TimedOut,
    /// The last session failed; waiting to reconnect, or stopped if the failure was fatal.
    Failed,
    /// Shut down on request.
    Cancelled,
}

impl fmt::Display for CrawlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::TimedOut => "timed out",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What a finished crawl did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Sessions opened or attempted.
    pub sessions: u64,
    /// Parsed messages received across all sessions.
    pub messages: u64,
}

/// Message rate over fixed-size batches.
#[derive(Debug)]
pub struct Throughput {
    every: u64,
    count: u64,
    window_start: Instant,
}

impl Throughput {
    /// Report every `every` messages.
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self {
            every,
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Messages recorded so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Count one message. Returns the rate in messages per second when a
    /// batch completes, then starts a new window.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self) -> Option<f64> {
        self.count += 1;
        if self.every == 0 || self.count % self.every != 0 {
            return None;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        self.window_start = now;
        Some(self.every as f64 / elapsed)
    }
}

/// Reconnecting stream consumer.
pub struct Crawler<S> {
    source: S,
    sink: RotatingSink,
    params: SessionParams,
    config: CrawlerConfig,
    state: CrawlerState,
}

impl<S> fmt::Debug for Crawler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crawler")
            .field("sink", &self.sink)
            .field("params", &self.params)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: StreamSource> Crawler<S> {
    /// Create a crawler with the default configuration.
    pub fn new(source: S, sink: RotatingSink, params: SessionParams) -> Self {
        Self {
            source,
            sink,
            params,
            config: CrawlerConfig::default(),
            state: CrawlerState::Connecting,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CrawlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CrawlerState {
        self.state
    }

    /// The output sink.
    #[must_use]
    pub const fn sink(&self) -> &RotatingSink {
        &self.sink
    }

    /// Session parameters.
    #[must_use]
    pub const fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Crawl until `shutdown` resolves or a fatal error occurs.
    ///
    /// The parameters are validated before the first connection.
    pub async fn run<F>(&mut self, shutdown: F) -> TwsdResult<CrawlSummary>
    where
        F: Future<Output = ()>,
    {
        self.params.validate()?;

        let Self {
            source,
            sink,
            params,
            config,
            state,
        } = self;

        tokio::pin!(shutdown);
        let mut reconnect = ReconnectHandler::new(ReconnectConfig::fixed(params.delay()));
        let mut summary = CrawlSummary::default();

        loop {
            transition(state, CrawlerState::Connecting);
            info!(
                endpoint = %params.endpoint(),
                params = ?params.params(),
                "Requesting stream"
            );
            summary.sessions += 1;

            let mut received = 0_u64;
            let session = async {
                let lines = source.open(&*params).await?;
                transition(&mut *state, CrawlerState::Streaming);

                let mut throughput = Throughput::new(config.report_every);
                let mut pipeline = MessagePipeline::new(lines, &mut *sink);
                while let Some(message) = pipeline.next().await {
                    let message = message?;
                    received += 1;
                    if let Some(rate) = throughput.record() {
                        info!(
                            total = throughput.count(),
                            "Total tweets: {}, rate: {rate:.2}/s",
                            throughput.count()
                        );
                    }
                    if config.echo {
                        println!("{}", message.raw());
                    }
                }
                Err::<Infallible, _>(TwsdError::from(StreamError::ConnectionClosed {
                    reason: "end of response body".to_string(),
                }))
            };

            let outcome = tokio::select! {
                biased;
                () = &mut shutdown => None,
                outcome = session => Some(outcome),
            };
            summary.messages += received;

            let error = match outcome {
                None => return Ok(cancel(state, summary)),
                Some(Ok(never)) => match never {},
                Some(Err(e)) => e,
            };

            match error {
                e if e.is_fatal() => {
                    transition(state, CrawlerState::Failed);
                    error!(error = %e, "Stopping crawler");
                    return Err(e);
                }
                e if e.is_timeout() => {
                    transition(state, CrawlerState::TimedOut);
                    info!(
                        timeout_secs = params.timeout().as_secs(),
                        delay_secs = params.delay().as_secs(),
                        "Request timed out. Waiting and retrying"
                    );
                }
                e => {
                    transition(state, CrawlerState::Failed);
                    warn!(
                        error = %e,
                        delay_secs = params.delay().as_secs(),
                        "Stream failed. Waiting and retrying"
                    );
                }
            }

            tokio::select! {
                biased;
                () = &mut shutdown => return Ok(cancel(state, summary)),
                () = reconnect.wait_for_reconnect() => {}
            }
        }
    }
}

fn transition(state: &mut CrawlerState, next: CrawlerState) {
    debug!(from = %state, to = %next, "Crawler state change");
    *state = next;
}

fn cancel(state: &mut CrawlerState, summary: CrawlSummary) -> CrawlSummary {
    transition(state, CrawlerState::Cancelled);
    info!(
        sessions = summary.sessions,
        messages = summary.messages,
        "Shutting down (manual shutdown)"
    );
    summary
}
