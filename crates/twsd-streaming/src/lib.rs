//! twsd streaming - line-oriented consumption of long-lived HTTP responses
//!
//! This crate provides the transport-level pieces of the stream downloader:
//!
//! - **Line framing**: turn a chunked byte stream into newline-delimited lines
//! - **Read timeouts**: end a stream with a distinguishable timeout signal when
//!   the remote side goes quiet
//! - **Reconnection**: fixed-delay reconnect bookkeeping
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use twsd_streaming::ByteStreamExt;
//!
//! let lines = response
//!     .bytes_stream()
//!     .with_timeout(Duration::from_secs(30))
//!     .lines();
//!
//! while let Some(line) = lines.next().await {
//!     match line {
//!         Ok(line) => println!("{}", String::from_utf8_lossy(&line)),
//!         Err(e) if e.is_timeout() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod lines;
mod reconnect;
mod stream;

pub use error::*;
pub use lines::*;
pub use reconnect::*;
pub use stream::*;

use std::time::Duration;

/// Default delay before reconnecting after a timeout or failure.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Default read timeout for a streaming connection.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of a single line before the stream is considered broken.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;
