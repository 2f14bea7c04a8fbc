//! Logging infrastructure.
//!
//! The interactive selector owns the terminal, so log output always goes
//! to a file under the cache namespace; a stderr layer is added only for
//! verbose or non-interactive runs. The level comes from the `--log` flag
//! and can be overridden with `RUST_LOG`.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log filename inside the log directory.
const LOG_FILE: &str = "npu.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Default log directory: alongside the cache, under the host temp dir.
pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join(crate::cache::CACHE_DIR_NAME)
}

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Default filter directive when `RUST_LOG` is unset
/// * `stderr` - Also mirror events to stderr (verbose / non-interactive)
///
/// # Returns
///
/// A guard that must be kept alive for logging to work.
pub fn init_logging(level: &str, stderr: bool) -> Result<LoggingGuard, io::Error> {
    let log_dir = default_log_dir();
    fs::create_dir_all(&log_dir)?;

    // One session per file; clear whatever the previous run left behind.
    fs::write(log_dir.join(LOG_FILE), "")?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stderr_layer = stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir_is_under_cache_namespace() {
        let dir = default_log_dir();
        assert!(dir.ends_with(crate::cache::CACHE_DIR_NAME));
    }

    // init_logging installs a global subscriber, which can only happen once
    // per process; actual output behaviour is covered manually and by the
    // file-system assertions below.
    #[test]
    fn test_log_dir_is_creatable() {
        let dir = default_log_dir();
        fs::create_dir_all(&dir).expect("log dir should be creatable");
        assert!(dir.exists());
    }
}
