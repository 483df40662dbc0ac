use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Verbosity;

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "SNAPSWEEP_LOG_DIR";

/// Directory for log files: `SNAPSWEEP_LOG_DIR`, else the system temp dir.
pub fn log_dir() -> PathBuf {
    std::env::var_os(LOG_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("snapsweep"))
}

/// Initialize file-based logging with daily log rotation.
///
/// Logs are written to `snapsweep.YYYY-MM-DD` in [`log_dir`]. The level
/// defaults to `info` (`debug` with `--verbose`) and can be overridden via
/// the `SNAPSWEEP_LOG` or `RUST_LOG` environment variables. The password is
/// never logged.
///
/// Returns a [`WorkerGuard`] that **must** be held for the lifetime of the program
/// to ensure buffered log records are flushed on shutdown.
pub fn init(verbosity: Verbosity) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir(), "snapsweep");

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = match verbosity {
        Verbosity::Verbose => "debug",
        _ => "info",
    };
    let env_filter = EnvFilter::try_from_env("SNAPSWEEP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .with(env_filter)
        .init();

    guard
}
