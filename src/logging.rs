//! Logging setup.
//!
//! Output always goes to stdout. When a log file is configured, a second
//! non-ANSI layer writes to it through a non-blocking, daily-rotated
//! `tracing_appender` writer. `RUST_LOG` overrides the configured level.

use std::backtrace::Backtrace;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogLevel;
use crate::worker::panic_message;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file path {0} has no file name")]
    NoFileName(String),

    #[error("failed to create log directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("failed to install global subscriber: {0}")]
    Init(String),
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Filter directive for a level: our own crate at `level`, everything else
/// no noisier than `info`.
pub fn filter_directive(level: LogLevel) -> String {
    let deps = match level {
        LogLevel::Debug | LogLevel::Info => "info",
        other => other.as_str(),
    };
    format!("{deps},cloud_update={level}")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<LoggingGuard, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(io::stdout);

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::NoFileName(path.display().to_string()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(LoggingError::CreateDir)?;

    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Routes panics through `tracing` with their location and a backtrace.
///
/// Worker panics are caught and the job failed; this hook makes sure the
/// stack that produced them still reaches the log.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());
        let message = panic_message(info.payload());
        let thread = std::thread::current();

        tracing::error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            %location,
            %backtrace,
            "panic: {message}"
        );
    }));
}
