//! Persist, parse and classify stream lines.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::stream::Stream;
use pin_project_lite::pin_project;
use serde_json::Value;
use tracing::{error, info, warn};
use twsd_streaming::StreamResult;

use crate::error::{TwsdError, TwsdResult};
use crate::sink::RotatingSink;

/// A parsed line from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    raw: String,
    value: Value,
}

impl StreamMessage {
    /// Parse a raw line.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_slice(raw)?;
        // JSON that decoded is valid UTF-8, so nothing is replaced here.
        let raw = String::from_utf8_lossy(raw).into_owned();
        Ok(Self { raw, value })
    }

    /// The line exactly as it was persisted.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded JSON.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the message, keeping the decoded JSON.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The `track` field of a limit notice, as sent. `Null` when the notice
    /// carries no count.
    #[must_use]
    pub fn limit_track(&self) -> Option<&Value> {
        let limit = self.value.get("limit")?;
        Some(limit.get("track").unwrap_or(&Value::Null))
    }

    /// Check if this is a limit notice.
    #[must_use]
    pub fn is_limit_notice(&self) -> bool {
        self.limit_track().is_some()
    }
}

fn count_text(track: &Value) -> String {
    match track {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run one line through the pipeline.
///
/// The trimmed line is saved byte for byte before anything else, so lines
/// that fail to decode are still kept on disk. Returns `Ok(None)` for
/// keep-alives and undecodable lines.
pub fn process_line(sink: &mut RotatingSink, line: &[u8]) -> TwsdResult<Option<StreamMessage>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        info!("Keep-alive message");
        return Ok(None);
    }

    sink.save(line)?;

    let message = match StreamMessage::parse(line) {
        Ok(message) => message,
        Err(e) => {
            error!(
                error = %e,
                line = %String::from_utf8_lossy(line),
                "Failed to parse message"
            );
            return Ok(None);
        }
    };

    if let Some(track) = message.limit_track() {
        warn!("LIMIT: {} tweets retained", count_text(track));
    }

    Ok(Some(message))
}

pin_project! {
    /// Stream of parsed messages backed by a stream of lines.
    ///
    /// Transport errors are passed through. A sink error is yielded once and
    /// ends the stream.
    pub struct MessagePipeline<'a, S> {
        #[pin]
        lines: S,
        sink: &'a mut RotatingSink,
        failed: bool,
    }
}

impl<'a, S> MessagePipeline<'a, S> {
    /// Create a pipeline writing to `sink`.
    pub const fn new(lines: S, sink: &'a mut RotatingSink) -> Self {
        Self {
            lines,
            sink,
            failed: false,
        }
    }
}

impl<S> Stream for MessagePipeline<'_, S>
where
    S: Stream<Item = StreamResult<Vec<u8>>>,
{
    type Item = TwsdResult<StreamMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.failed {
            return Poll::Ready(None);
        }

        loop {
            let line = match ready!(this.lines.as_mut().poll_next(cx)) {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Poll::Ready(Some(Err(TwsdError::from(e)))),
                None => return Poll::Ready(None),
            };

            match process_line(this.sink, &line) {
                Ok(Some(message)) => return Poll::Ready(Some(Ok(message))),
                Ok(None) => {}
                Err(e) => {
                    *this.failed = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
