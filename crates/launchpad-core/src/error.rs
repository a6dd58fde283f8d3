//! Error types for Launchpad.
//!
//! The bootstrap errors (`EnvironmentMissing`, `FetchFailed`, `InstallFailed`)
//! abort the whole run. The per-service errors (`BuildFailed`, `LaunchFailed`)
//! only abort that service's launch.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the Launchpad library.
#[derive(Debug, Error)]
pub enum LaunchpadError {
    // Bootstrap errors
    #[error("Runtime environment missing: {reason}")]
    EnvironmentMissing { reason: String },

    #[error("Runtime fetch failed: {message}")]
    FetchFailed { message: String },

    #[error("Dependency installation failed for {project}: {stderr}")]
    InstallFailed { project: String, stderr: String },

    // Per-service errors
    #[error("Build failed for {service}: {stderr}")]
    BuildFailed { service: String, stderr: String },

    #[error("Process launch failed for {service}: {message}")]
    LaunchFailed { service: String, message: String },

    #[error("Interrupted by termination signal")]
    SignalInterrupt,

    // Command runner errors
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    // Supervisor errors
    #[error("Process group {pgid} is already supervised")]
    DuplicateProcessGroup { pgid: u32 },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Launchpad operations.
pub type Result<T> = std::result::Result<T, LaunchpadError>;

impl From<std::io::Error> for LaunchpadError {
    fn from(err: std::io::Error) -> Self {
        LaunchpadError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for LaunchpadError {
    fn from(err: reqwest::Error) -> Self {
        LaunchpadError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LaunchpadError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LaunchpadError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this error aborts the bootstrap sequence as a whole.
    pub fn is_bootstrap_fatal(&self) -> bool {
        matches!(
            self,
            LaunchpadError::EnvironmentMissing { .. }
                | LaunchpadError::FetchFailed { .. }
                | LaunchpadError::InstallFailed { .. }
        )
    }

    /// Process exit code the launcher uses when it stops because of this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchpadError::SignalInterrupt => 0,
            _ => 1,
        }
    }
}
