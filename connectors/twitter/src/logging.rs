//! Operational logging to stderr and a companion log file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{TwsdError, TwsdResult};

/// Path of the log file that accompanies output files with `prefix`.
#[must_use]
pub fn log_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}.log"))
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    /// File that receives `info` and above, without colors.
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

impl LoggingConfig {
    /// Log at `level` to stderr only.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            log_file: None,
        }
    }

    /// Also log to `path`.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

fn open_log_file(path: &Path) -> TwsdResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TwsdError::Config(format!("cannot open log file {}: {e}", path.display())))
}

fn build_subscriber(config: &LoggingConfig) -> TwsdResult<impl Subscriber + Send + Sync + use<>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TwsdError::Config(format!("invalid log level {:?}: {e}", config.level)))?;

    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_filter(LevelFilter::INFO),
        ),
        None => None,
    };

    // The file keeps `info` and above whatever the stderr filter says.
    Ok(tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .with(file_layer))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> TwsdResult<()> {
    build_subscriber(config)?
        .try_init()
        .map_err(|e| TwsdError::Config(format!("cannot initialize logging: {e}")))
}
