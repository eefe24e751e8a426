//! Stream adapters for long-lived connections.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Sleep, sleep};

use crate::{LineStream, StreamError, StreamResult};

/// Extension trait for fallible byte streams such as `reqwest::Response::bytes_stream`.
pub trait ByteStreamExt: Stream {
    /// End the stream with [`StreamError::Timeout`] when no item arrives within `timeout`.
    fn with_timeout(self, timeout: Duration) -> TimeoutStream<Self>
    where
        Self: Sized,
    {
        TimeoutStream::new(self, timeout)
    }

    /// Split the byte chunks into newline-delimited lines.
    fn lines(self) -> LineStream<Self>
    where
        Self: Sized,
    {
        LineStream::new(self)
    }
}

impl<S: Stream> ByteStreamExt for S {}

pin_project! {
    /// Stream with a per-item read timeout.
    ///
    /// The deadline restarts every time the inner stream yields. Once it fires,
    /// a single `Err(StreamError::Timeout)` is yielded and the stream ends.
    pub struct TimeoutStream<S> {
        #[pin]
        inner: S,
        timeout: Duration,
        #[pin]
        deadline: Option<Sleep>,
        expired: bool,
    }
}

impl<S> TimeoutStream<S> {
    /// Create a new timeout stream.
    pub const fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            deadline: None,
            expired: false,
        }
    }

    /// The configured read timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<S, T, E> Stream for TimeoutStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: Into<StreamError>,
{
    type Item = StreamResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.expired {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.deadline.set(None);
                return Poll::Ready(Some(item.map_err(Into::into)));
            }
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        if this.deadline.is_none() {
            this.deadline.set(Some(sleep(*this.timeout)));
        }

        if let Some(deadline) = this.deadline.as_mut().as_pin_mut() {
            if deadline.poll(cx).is_ready() {
                *this.expired = true;
                this.deadline.set(None);
                return Poll::Ready(Some(Err(StreamError::Timeout(*this.timeout))));
            }
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{self, StreamExt as _};
    use tokio::pin;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_timeout_stream_success() {
        let stream = stream::iter(vec![Ok::<_, StreamError>(1), Ok(2), Ok(3)]);
        let timeout_stream = TimeoutStream::new(stream, Duration::from_secs(1));
        pin!(timeout_stream);

        let mut results = Vec::new();
        while let Some(result) = timeout_stream.next().await {
            results.push(result.unwrap());
        }

        assert_eq!(results, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once_then_ends() {
        let stream = stream::iter(vec![Ok::<_, StreamError>(1)]).chain(stream::pending());
        let timeout_stream = stream.with_timeout(Duration::from_secs(30));
        pin!(timeout_stream);

        assert_eq!(timeout_stream.next().await.unwrap().unwrap(), 1);

        let started = Instant::now();
        let err = timeout_stream.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(30));

        assert!(timeout_stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_restarts_after_each_item() {
        let delayed = stream::iter(0..3).then(|i| async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok::<_, StreamError>(i)
        });
        let timeout_stream = delayed.with_timeout(Duration::from_secs(30));
        pin!(timeout_stream);

        // 60 seconds in total, but never more than 20 between items.
        let mut results = Vec::new();
        while let Some(result) = timeout_stream.next().await {
            results.push(result.unwrap());
        }
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_inner_errors_are_converted() {
        let stream = stream::iter(vec![Err::<u8, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))]);
        let timeout_stream = stream.with_timeout(Duration::from_secs(1));
        pin!(timeout_stream);

        let err = timeout_stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::IoError(_)));
        assert!(!err.is_timeout());
    }
}
