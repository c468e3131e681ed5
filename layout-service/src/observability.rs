//! Tracing subscriber setup
//!
//! Logs go to stdout by default. When `log.dir` is set they are written to a
//! (optionally rotating) file through a non-blocking writer instead.

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{LogConfig, LogFormat, LogRotation},
    error::{Error, Result},
};

/// Keeps the background log writer alive; logs are flushed when dropped
#[must_use = "dropping the guard stops log output"]
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Initialize the global tracing subscriber
pub fn init_tracing(config: &LogConfig, service_name: &str) -> Result<LogGuard> {
    let filter = build_filter(&config.level);

    let (writer, worker) = match &config.dir {
        Some(dir) => {
            let file_name = config
                .filename
                .clone()
                .unwrap_or_else(|| format!("{}.log", service_name));
            let appender = RollingFileAppender::builder()
                .rotation(rotation(config.rotation))
                .filename_prefix(file_name)
                .build(dir)
                .map_err(|e| {
                    Error::Internal(format!(
                        "Failed to open log file in {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!("Tracing initialized for service: {}", service_name);

    Ok(LogGuard { _worker: worker })
}

/// `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(normalize_level(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Accept the level spellings found in existing config files
fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    }
}
