//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber from `LoggingConfig`
//! - Console sink with timestamp, level, target and thread id
//! - Optional debug sink on stderr
//! - Rotating file sink under the configured logs directory
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - The file sink writes through a non-blocking worker; its guard is owned
//!   by the application context and dropped during teardown
//! - A second initialization in the same process is ignored

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LoggingConfig, Rotation};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open rolling log file")]
    Appender(#[from] rolling::InitError),
}

/// Install the global subscriber. Returns the file sink guard, if any.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let console = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(console_filter);

    let debug = config.debug_sink.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_filter(LevelFilter::DEBUG)
    });

    let (file, guard) = if config.file.enabled {
        let directory = &config.file.directory;
        fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
            path: directory.clone(),
            source,
        })?;

        let rotation = match config.file.rotation {
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
            Rotation::Never => rolling::Rotation::NEVER,
        };
        let appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(&config.file.prefix)
            .build(directory)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(EnvFilter::new(&config.level));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    if tracing_subscriber::registry()
        .with(console)
        .with(debug)
        .with(file)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed, keeping it");
        return Ok(None);
    }

    tracing::debug!(
        level = %config.level,
        debug_sink = config.debug_sink,
        file_sink = config.file.enabled,
        "Logging initialized"
    );
    Ok(guard)
}
