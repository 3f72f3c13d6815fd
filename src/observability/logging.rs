//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Select plain, pretty or JSON output
//! - Write to stdout, or to a daily rolling file when a directory is set
//!
//! # Design Decisions
//! - `RUST_LOG` takes precedence over the configured level
//! - Output goes through a non-blocking writer whose worker is owned here, so
//!   code that exits the process without unwinding can call [`flush`] first

use std::io::{self, IsTerminal};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log directory: {0}")]
    Appender(#[from] InitError),

    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

static WORKER: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Keeps the background log writer running. Dropping it calls [`flush`].
#[derive(Debug)]
#[must_use = "dropping the guard stops the log writer"]
pub struct LoggingGuard {
    _private: (),
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        flush();
    }
}

/// Write out every queued log line and stop the background writer.
///
/// Blocks until the writer has drained. Lines logged afterwards are dropped.
pub fn flush() {
    let worker = WORKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    drop(worker);
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = env_filter(config);

    let (writer, guard) = match &config.directory {
        Some(directory) => {
            let mut builder = RollingFileAppender::builder().rotation(Rotation::DAILY);
            if !config.file_prefix.is_empty() {
                builder = builder.filename_prefix(&config.file_prefix);
            }
            if !config.file_suffix.is_empty() {
                builder = builder.filename_suffix(&config.file_suffix);
            }
            let appender = builder.build(directory)?;
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(io::stdout()),
    };
    let ansi = config.directory.is_none() && io::stdout().is_terminal();

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init()?,
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init()?,
    }

    *WORKER.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);
    Ok(LoggingGuard { _private: () })
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
