//! Logging setup.
//!
//! Structured `tracing` output goes to a log file (cleared at the start of
//! each session) and to stdout. The level comes from `RUST_LOG` and
//! defaults to `info`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Install the global subscriber writing to `log_dir/log_file` and stdout.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file, created if missing
/// * `log_file` - File name inside `log_dir`; existing content is cleared
///
/// # Returns
///
/// A [`LoggingGuard`] that must be held for the life of the process.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the log file
/// cannot be truncated, or a global subscriber is already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// [`init_logging`] with the locations from the engine configuration.
///
/// # Errors
///
/// Same as [`init_logging`].
pub fn init_from_settings(settings: &LoggingSettings) -> Result<LoggingGuard, io::Error> {
    init_logging(&settings.directory, &settings.file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per process, so a
    // single test covers both the first install and the refusal after it.
    #[test]
    fn test_init_clears_file_and_installs_once() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join("gips.log"), "old session").unwrap();

        let guard = init_logging(&log_dir, "gips.log").unwrap();
        assert!(!fs::read_to_string(log_dir.join("gips.log"))
            .unwrap()
            .contains("old session"));

        assert!(init_logging(&log_dir, "gips.log").is_err());
        drop(guard);
    }
}
