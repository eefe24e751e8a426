//! Streaming session configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{TwsdError, TwsdResult};

/// Base URL of the Streaming API.
pub const DEFAULT_STREAM_URL: &str = "https://stream.twitter.com";

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = twsd_streaming::DEFAULT_READ_TIMEOUT;

/// Default delay before reconnecting.
pub const DEFAULT_DELAY: Duration = twsd_streaming::DEFAULT_RECONNECT_DELAY;

/// Parameters of which `filter` needs at least one.
pub const FILTER_KEYS: [&str; 3] = ["track", "locations", "follow"];

/// Streaming API method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Tweets matching `track`, `locations` or `follow`.
    Filter,
    /// A random sample of all public tweets.
    Sample,
    /// All public tweets.
    Firehose,
}

impl Endpoint {
    /// Method name as it appears in the URL.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Sample => "sample",
            Self::Firehose => "firehose",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = TwsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filter" => Ok(Self::Filter),
            "sample" => Ok(Self::Sample),
            "firehose" => Ok(Self::Firehose),
            other => Err(TwsdError::Config(format!(
                "unknown endpoint {other:?} (expected filter, sample or firehose)"
            ))),
        }
    }
}

/// Parse a `NAME=VALUE` method parameter.
///
/// Only the first `=` separates name from value, so values may contain `=`.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {s:?}")),
    }
}

/// What to request from the Streaming API, and how patiently.
///
/// Fixed for the lifetime of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    endpoint: Endpoint,
    params: BTreeMap<String, String>,
    timeout: Duration,
    delay: Duration,
}

impl SessionParams {
    /// Create parameters for `endpoint` with default timeout and delay.
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            params: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
        }
    }

    /// Add a method parameter. A repeated name keeps the last value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add several method parameters.
    #[must_use]
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the reconnect delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Streaming method.
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Method parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Read timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reconnect delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Method parameters as form fields.
    #[must_use]
    pub fn form(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Check the parameters before any connection is attempted.
    pub fn validate(&self) -> TwsdResult<()> {
        if self.timeout.is_zero() {
            return Err(TwsdError::Config("timeout must be greater than zero".into()));
        }

        if self.endpoint == Endpoint::Filter
            && !FILTER_KEYS.iter().any(|key| self.params.contains_key(*key))
        {
            return Err(TwsdError::Config(format!(
                "the filter endpoint needs at least one of the parameters {} (use -p NAME=VALUE)",
                FILTER_KEYS.join(", ")
            )));
        }

        Ok(())
    }
}
