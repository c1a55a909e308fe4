//! Rotating log system
//!
//! Logs to both console and daily-rotating files in the configured log dir.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,data_skyline=debug";

/// Initialize console and rotating file logging
///
/// Falls back to console-only logging when the log directory can't be
/// created.
pub fn init_logging(log_dir: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let log_path = Path::new(log_dir);
    if let Err(e) = std::fs::create_dir_all(log_path) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        tracing::warn!("Cannot create log directory {}: {}; logging to console only", log_dir, e);
        return;
    }

    // data_skyline.YYYY-MM-DD.log
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "data_skyline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Logging lasts for the whole program, so the flush guard is never dropped
    std::mem::forget(guard);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized. Log directory: {}", log_dir);
}
