//! Newline framing for chunked response bodies.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::stream::Stream;
use pin_project_lite::pin_project;

use crate::{DEFAULT_MAX_LINE_LENGTH, StreamError, StreamResult};

pin_project! {
    /// Splits a stream of byte chunks into lines.
    ///
    /// Lines are terminated by `\n`; a preceding `\r` is stripped. Line bytes
    /// are passed through untouched, whatever their encoding. Empty lines are
    /// yielded so callers can observe keep-alives. A final unterminated line is
    /// flushed when the inner stream ends. After an error the buffered partial
    /// line is discarded and the stream ends.
    pub struct LineStream<S> {
        #[pin]
        inner: S,
        buffer: Vec<u8>,
        // Bytes of `buffer` already known to hold no newline.
        scanned: usize,
        max_line_length: usize,
        done: bool,
    }
}

impl<S> LineStream<S> {
    /// Create a new line stream.
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            scanned: 0,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            done: false,
        }
    }

    /// Set the maximum length of a single line.
    #[must_use]
    pub const fn with_max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }
}

fn strip_cr(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

impl<S, B> Stream for LineStream<S>
where
    S: Stream<Item = StreamResult<B>>,
    B: AsRef<[u8]>,
{
    type Item = StreamResult<Vec<u8>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let unscanned = &this.buffer[*this.scanned..];
            if let Some(offset) = unscanned.iter().position(|&b| b == b'\n') {
                let newline = *this.scanned + offset;
                let rest = this.buffer.split_off(newline + 1);
                let mut line = std::mem::replace(this.buffer, rest);
                line.pop();
                *this.scanned = 0;
                return Poll::Ready(Some(Ok(strip_cr(line))));
            }
            *this.scanned = this.buffer.len();

            if this.buffer.len() > *this.max_line_length {
                let size = this.buffer.len();
                this.buffer.clear();
                *this.scanned = 0;
                *this.done = true;
                return Poll::Ready(Some(Err(StreamError::BufferOverflow {
                    size,
                    limit: *this.max_line_length,
                })));
            }

            if *this.done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                *this.scanned = 0;
                return Poll::Ready(Some(Ok(strip_cr(std::mem::take(this.buffer)))));
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    this.buffer.clear();
                    *this.scanned = 0;
                    *this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => *this.done = true,
            }
        }
    }
}
