//! Fixed-delay reconnection.
//!
//! Every reconnect waits the same delay and there is no cap: a stream is
//! retried until the caller stops asking.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::DEFAULT_RECONNECT_DELAY;

/// Reconnection configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Pause before every reconnect.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Reconnect forever, waiting `delay` each time.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Counts reconnects and sleeps between them.
#[derive(Debug)]
pub struct ReconnectHandler {
    config: ReconnectConfig,
    attempts: u64,
}

impl ReconnectHandler {
    /// Create a handler.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Reconnects so far.
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Count a reconnect and return how long to wait before it.
    pub const fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.config.delay
    }

    /// Sleep before the next reconnect.
    pub async fn wait_for_reconnect(&mut self) {
        let delay = self.next_delay();
        debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis(),
            "Waiting before reconnecting"
        );
        sleep(delay).await;
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_default_never_gives_up() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(10));

        let mut handler = ReconnectHandler::new(config);
        for _ in 0..1000 {
            assert_eq!(handler.next_delay(), config.delay);
        }
        assert_eq!(handler.attempts(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_the_fixed_delay() {
        let delay = Duration::from_secs(7);
        let mut handler = ReconnectHandler::new(ReconnectConfig::fixed(delay));

        for attempt in 1..=3 {
            let started = Instant::now();
            handler.wait_for_reconnect().await;
            assert_eq!(started.elapsed(), delay);
            assert_eq!(handler.attempts(), attempt);
        }
    }
}
