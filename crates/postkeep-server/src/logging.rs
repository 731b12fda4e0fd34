//! Console and file logging

use crate::config::Config;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter for the log file, independent of the console mode
const FILE_DIRECTIVE: &str = "info,postkeep_server=debug,tower_http=debug";

/// Install the global subscriber.
///
/// The console honours `--log-mode` unless `RUST_LOG` is set; the file in the
/// data directory always receives debug output. Keep the returned guard alive
/// until exit so buffered file lines are written.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::never(&config.data_dir, &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_mode.directive()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(console_filter))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_DIRECTIVE)),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
