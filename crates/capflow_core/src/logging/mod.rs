//! Logging infrastructure for the captioning pipeline.
//!
//! This module provides:
//! - Per-run loggers with file + UI callback dual output
//! - Compact mode with progress filtering
//! - Tail buffer for error diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use capflow_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("episode_01", "/path/to/logs", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Transcribing");
//! logger.info("Engine: accurate");
//! logger.progress(50);
//! logger.success("Run completed");
//! ```

mod run_logger;
mod types;

use std::path::Path;

pub use run_logger::{sanitize_filename, RunLogger, RunLoggerBuilder};
pub use types::{LogConfig, LogLevel, MessagePrefix, UiLogCallback};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Initialize tracing to stderr plus a daily-rolling file in `logs_dir`.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the application.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "capflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Warn), "warn");
    }
}
