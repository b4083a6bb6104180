//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. With a configured
//! directory, a daily-rolling file layer is added next to the console layer.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::ServiceError;

pub const LOG_FILE_PREFIX: &str = "claims-service.log";

/// Keeps the file writer flushing until dropped
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Builds the filter from `RUST_LOG`, falling back to `level` and then `info`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, ServiceError> {
    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.level))
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| ServiceError::Logging(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

