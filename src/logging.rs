//! Logging setup for the binaries

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::SchemeError;
use crate::Result;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "scheme_finder.log";

/// Install stderr + daily-rolling file logging.
///
/// `RUST_LOG` wins over `default_filter`. Keep the returned guard alive for
/// the life of the process or buffered file output is lost.
pub fn init_tracing(default_filter: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(Path::new(LOG_DIR))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SchemeError::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!("Logging to stderr and {}/{}.YYYY-MM-DD", LOG_DIR, LOG_FILE);
    Ok(guard)
}
