//! Date-partitioned append-only output.
//!
//! Every line lands in `<prefix>_<YYYYMMDD>.json`, where the key is the local
//! calendar date at the moment the line is saved. The key is recomputed on
//! every write so a long capture rolls over at midnight on its own.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::error::SinkError;

/// Source of the current calendar date.
pub trait Clock: Send {
    /// Today's date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Rotation key for a date (`YYYYMMDD`).
#[must_use]
pub fn rotation_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

struct OpenFile {
    key: String,
    path: PathBuf,
    file: File,
}

/// Appends lines to one file per calendar day.
pub struct RotatingSink {
    prefix: String,
    clock: Box<dyn Clock>,
    current: Option<OpenFile>,
}

impl fmt::Debug for RotatingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingSink")
            .field("prefix", &self.prefix)
            .field("current", &self.current_path())
            .finish_non_exhaustive()
    }
}

impl RotatingSink {
    /// Create a sink driven by the local wall clock.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_clock(prefix, LocalClock)
    }

    /// Create a sink driven by `clock`.
    pub fn with_clock(prefix: impl Into<String>, clock: impl Clock + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            clock: Box::new(clock),
            current: None,
        }
    }

    /// Output path for a rotation key.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        PathBuf::from(format!("{}_{key}.json", self.prefix))
    }

    /// Path of the file currently open, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }

    /// Append `line` and a newline to today's file.
    pub fn save(&mut self, line: &[u8]) -> Result<(), SinkError> {
        let key = rotation_key(self.clock.today());

        let mut open = match self.current.take() {
            Some(open) if open.key == key => open,
            previous => {
                if let Some(previous) = previous {
                    debug!(path = %previous.path.display(), "Closing output file");
                }
                self.open(key)?
            }
        };

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line);
        record.push(b'\n');

        let result = open.file.write_all(&record).map_err(|source| SinkError::Write {
            path: open.path.clone(),
            source,
        });
        self.current = Some(open);
        result
    }

    /// Flush the open file to durable storage. A no-op when nothing is open.
    pub fn sync(&mut self) -> Result<(), SinkError> {
        match &self.current {
            Some(open) => open.file.sync_data().map_err(|source| SinkError::Write {
                path: open.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    fn open(&self, key: String) -> Result<OpenFile, SinkError> {
        let path = self.path_for(&key);
        let open_error = |source| SinkError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error)?;

        info!(path = %path.display(), "Writing to output file");
        Ok(OpenFile { key, path, file })
    }
}
