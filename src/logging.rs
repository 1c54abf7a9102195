use std::path::Path;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;
use crate::error::{Result, ScrapingError};

const FILE_DIRECTIVE: &str = "review_insight=debug,info";

/// Console filter directive when `RUST_LOG` is not set.
pub fn console_directive(config: &LogConfig) -> &str {
    if config.debug {
        "debug"
    } else {
        &config.level
    }
}

/// Installs the console layer plus an optional non-ANSI file layer.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn setup_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directive(config)));

    let mut layers = Vec::new();
    layers.push(
        subscriber_fmt::layer()
            .with_target(true)
            .with_filter(console_filter)
            .boxed(),
    );

    let mut guard = None;
    if let Some(ref file) = config.file {
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = file
            .file_name()
            .ok_or_else(|| ScrapingError::ConfigError(format!("Invalid log file path {:?}", file)))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to create log directory: {}", e)))?;

        let (writer, worker_guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(
            subscriber_fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_filter(EnvFilter::new(FILE_DIRECTIVE))
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| ScrapingError::ConfigError(format!("Failed to set global default subscriber: {}", e)))?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(guard)
}
