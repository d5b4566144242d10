//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: a console layer, a daily rolling file
//! layer and an [`EnvFilter`]. `RUST_LOG` wins over the configured level when set.

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// # Log Options
///
/// Where and how the subscriber writes.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directive used when `RUST_LOG` is not set, e.g. `info` or `lib_pricefeed=debug`.
    pub level: String,
    /// Directory for the rolling log files. Created if missing.
    pub log_dir: PathBuf,
    /// File name prefix; the date is appended per day.
    pub file_prefix: String,
    /// Write the file layer as JSON lines instead of plain text.
    pub json: bool,
    /// Also log to stdout.
    pub console: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            file_prefix: "pricefeed".to_string(),
            json: true,
            console: true,
        }
    }
}

fn env_filter(level: &str) -> io::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive for as
/// long as the process logs. Fails if the log directory cannot be created, the level
/// does not parse, or a subscriber is already installed.
pub fn init_tracing(options: &LogOptions) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(&options.log_dir)?;

    let file_appender = rolling::daily(&options.log_dir, &options.file_prefix);
    let (writer, guard) = non_blocking(file_appender);

    let file_layer = if options.json {
        fmt::layer().with_ansi(false).with_writer(writer).json().boxed()
    } else {
        fmt::layer().with_ansi(false).with_writer(writer).boxed()
    };
    let console_layer = options
        .console
        .then(|| fmt::layer().with_target(true).with_ansi(true));

    tracing_subscriber::registry()
        .with(env_filter(&options.level)?)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    tracing::info!(level = %options.level, dir = %options.log_dir.display(), "Logging initialized");
    Ok(guard)
}
