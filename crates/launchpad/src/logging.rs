//! Logging setup: one log file per run, stderr echo in debug mode.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use launchpad_core::config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `<logs_dir>/launcher_YYYYMMDD_HHMMSS.log`
pub fn log_file_path(logs_dir: &Path, now: DateTime<Local>) -> PathBuf {
    logs_dir.join(format!(
        "{}_{}.log",
        AppConfig::LOG_FILE_PREFIX,
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Install the global subscriber. Returns the log file path.
///
/// `RUST_LOG` overrides the default level.
pub fn init(logs_dir: &Path, debug: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let path = log_file_path(logs_dir, Local::now());
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    // Operator-facing output already goes to stdout; stderr only in debug mode.
    let stderr_layer = debug.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = log_file_path(Path::new("logs"), now);
        assert_eq!(path, PathBuf::from("logs").join("launcher_20240309_070501.log"));
    }
}
