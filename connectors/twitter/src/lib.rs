//! twsd - Twitter Stream Downloader
//!
//! Connects to a Streaming API endpoint, persists every received line to a
//! date-partitioned append-only file and reconnects on timeouts and transient
//! failures until cancelled.
//!
//! ## Components
//!
//! - [`RotatingSink`] - appends lines to `<prefix>_<YYYYMMDD>.json`
//! - [`MessagePipeline`] - persists, parses and classifies raw lines
//! - [`HttpStreamSource`] - one signed streaming POST per session
//! - [`Crawler`] - the reconnect loop

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod crawler;
mod error;
mod logging;
mod pipeline;
mod session;
mod sink;

pub use config::{
    DEFAULT_DELAY, DEFAULT_STREAM_URL, DEFAULT_TIMEOUT, Endpoint, FILTER_KEYS, SessionParams,
    parse_param,
};
pub use crawler::{
    CrawlSummary, Crawler, CrawlerConfig, CrawlerState, DEFAULT_REPORT_EVERY, Throughput,
};
pub use error::{SinkError, TwsdError, TwsdResult};
pub use logging::{LoggingConfig, init_logging, log_path};
pub use pipeline::{MessagePipeline, StreamMessage, process_line};
pub use session::{HttpStreamSource, LineStream, StreamSource};
pub use sink::{Clock, LocalClock, RotatingSink, rotation_key};
