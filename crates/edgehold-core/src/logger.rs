//! Logging setup.
//!
//! Installs a tracing subscriber with an `EnvFilter` (`RUST_LOG` wins over the configured
//! level), a stdout layer, and an optional daily-rolling file layer. `log` records from
//! dependencies are bridged into tracing.

use edgehold_types::{ConfigError, LogConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::{AppError, AppResult};

const LOG_FILE_PREFIX: &str = "edgehold.log";

/// Initialize global logging. Keep the returned guard alive for the process lifetime,
/// otherwise buffered file output is lost.
pub fn init_logger(config: &LogConfig) -> AppResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::invalid("log.level", e.to_string()))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if config.json {
        layers.push(fmt::layer().json().boxed());
    } else {
        layers.push(fmt::layer().with_target(true).boxed());
    }

    let guard = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        },
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Config(ConfigError::invalid("log", e.to_string())))?;

    // Dependencies still logging through `log` (rusqlite, hyper internals).
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }

    tracing::debug!(level = %config.level, file = config.log_dir.is_some(), "Logger initialized");
    Ok(guard)
}
