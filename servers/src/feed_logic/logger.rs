use anyhow::{Context, Result};
use lib_pricefeed::loggers::init_tracing;
use tracing_appender::non_blocking::WorkerGuard;

use crate::feed_logic::config::Settings;

/// Installs console and rolling file logging. Keep the guard until exit so the file
/// writer gets flushed.
pub fn setup_logging(settings: &Settings) -> Result<WorkerGuard> {
    let options = settings.log_options();
    init_tracing(&options)
        .with_context(|| format!("failed to initialise logging in {}", options.log_dir.display()))
}
