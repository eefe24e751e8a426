//! twsd - download tweets in realtime using the Twitter Streaming API

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum, error::ErrorKind};
use tracing::{info, warn};
use twsd::{
    Crawler, CrawlerConfig, DEFAULT_REPORT_EVERY, DEFAULT_STREAM_URL, Endpoint, HttpStreamSource,
    LoggingConfig, RotatingSink, SessionParams, init_logging, log_path, parse_param,
};
use twsd_oauth::{Keychain, OAuth1Config, default_keychain_path};

mod credentials;
mod prompt;

const EPILOG: &str = "\
Examples:
  twsd filter tweets -p track=rust,tokio
  twsd sample data/sample --timeout 60 --delay 5
  twsd authorize";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// Tweets matching track, locations or follow
    Filter,
    /// A random sample of public tweets
    Sample,
    /// All public tweets
    Firehose,
    /// Set up credentials and exit
    Authorize,
}

impl Method {
    const fn endpoint(self) -> Option<Endpoint> {
        match self {
            Self::Filter => Some(Endpoint::Filter),
            Self::Sample => Some(Endpoint::Sample),
            Self::Firehose => Some(Endpoint::Firehose),
            Self::Authorize => None,
        }
    }
}

/// Download Twitter streams using the Streaming API.
#[derive(Debug, Parser)]
#[command(name = "twsd")]
#[command(author, version, about, long_about = None, after_help = EPILOG)]
struct Cli {
    /// Method of the Streaming API to use
    #[arg(value_enum)]
    endpoint: Method,

    /// Write tweets to <FILEPREFIX>_<YYYYMMDD>.json and logs to <FILEPREFIX>.log
    fileprefix: Option<String>,

    /// Add a method parameter
    #[arg(short = 'p', value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Print every tweet to stdout
    #[arg(short = 'o', long = "print")]
    print: bool,

    /// Streaming timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Delay before reconnecting, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    delay: u64,

    /// Credential file [default: ~/.twsd.auth]
    #[arg(long, value_name = "PATH")]
    auth_file: Option<PathBuf>,

    /// Account label in the credential file [default: the first one]
    #[arg(long, value_name = "LABEL")]
    user: Option<String>,

    /// Log throughput every N tweets (0 disables)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_REPORT_EVERY)]
    report_every: u64,

    /// Streaming API base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_STREAM_URL)]
    stream_url: String,

    /// Log level, overridden by RUST_LOG
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(endpoint) = cli.endpoint.endpoint() else {
        return authorize(&cli);
    };

    let Some(prefix) = cli.fileprefix.clone() else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "FILEPREFIX is required for streaming endpoints",
            )
            .exit();
    };

    let params = SessionParams::new(endpoint)
        .with_params(cli.params.iter().cloned())
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_delay(Duration::from_secs(cli.delay));
    params.validate().context("Invalid stream parameters")?;

    let log_file = log_path(&prefix);
    create_parent_dir(&log_file)?;
    init_logging(&LoggingConfig::new(&cli.log_level).with_log_file(&log_file))?;
    info!(version = env!("CARGO_PKG_VERSION"), "twsd starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let Some(keychain) = runtime.block_on(load_credentials(&cli, false))? else {
        return Ok(());
    };
    let signer = keychain
        .signer(cli.user.as_deref())
        .context("No usable credentials")?;

    let source = HttpStreamSource::new(Arc::new(signer))?.with_stream_url(&cli.stream_url);
    let config = CrawlerConfig::new()
        .with_report_every(cli.report_every)
        .with_echo(cli.print);
    let mut crawler = Crawler::new(source, RotatingSink::new(prefix), params).with_config(config);

    let summary = runtime.block_on(crawler.run(shutdown_signal()))?;
    info!(
        sessions = summary.sessions,
        tweets = summary.messages,
        "Crawl finished"
    );

    Ok(())
}

fn authorize(cli: &Cli) -> Result<()> {
    init_logging(&LoggingConfig::new(&cli.log_level))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Some(keychain) = runtime.block_on(load_credentials(cli, true))? {
        let labels: Vec<_> = keychain.labels().collect();
        info!(users = ?labels, "Credentials ready");
    }
    Ok(())
}

async fn load_credentials(cli: &Cli, force_new_user: bool) -> Result<Option<Keychain>> {
    let path = match &cli.auth_file {
        Some(path) => path.clone(),
        None => default_keychain_path()
            .context("Cannot locate the home directory; pass --auth-file")?,
    };

    let stdin = std::io::stdin();
    credentials::Setup {
        path: &path,
        label: cli.user.as_deref(),
        force_new_user,
        oauth_config: |consumer: &twsd_oauth::ConsumerCredentials| {
            OAuth1Config::twitter(&consumer.key, &consumer.secret)
        },
        input: stdin.lock(),
        output: std::io::stdout(),
    }
    .run()
    .await
}

fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display())),
        _ => Ok(()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
