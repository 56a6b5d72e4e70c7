//! Tracing subscriber setup for the two binaries.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{PipelineError, Result};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "x402_pipeline=info,dune_client=info";

/// File name prefix for the daily-rolling log file.
pub const LOG_FILE_PREFIX: &str = "scheduler";

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Stderr only, leaving stdout for command output.
    Stderr,
    /// Stdout plus a daily-rolling file in the given directory.
    StdoutAndFile(PathBuf),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file sink when dropped; hold it for the
/// life of the process.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a subscriber is already
/// installed.
pub fn init(target: LogTarget) -> Result<Option<WorkerGuard>> {
    let already_set = |e: tracing_subscriber::util::TryInitError| {
        PipelineError::Config(format!("logging already initialised: {e}"))
    };

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(already_set)?;
            Ok(None)
        }
        LogTarget::StdoutAndFile(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(file_writer),
                )
                .try_init()
                .map_err(already_set)?;
            Ok(Some(guard))
        }
    }
}
