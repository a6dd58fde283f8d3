//! Runtime layout inside the project-local runtime directory.

use super::PlatformStrategy;
use std::path::{Path, PathBuf};

/// Get the path to the runtime executable.
///
/// # Platform Behavior
/// - **Unix**: `{runtime_dir}/bin/node`
/// - **Windows**: `{runtime_dir}/node.exe`
pub fn runtime_executable_path(strategy: PlatformStrategy, runtime_dir: &Path) -> PathBuf {
    match strategy {
        PlatformStrategy::Unix => runtime_dir.join("bin").join("node"),
        PlatformStrategy::Windows => runtime_dir.join("node.exe"),
    }
}

/// Get the path to the package manager entry point.
///
/// # Platform Behavior
/// - **Unix**: `{runtime_dir}/bin/npm` (a script run by the runtime)
/// - **Windows**: `{runtime_dir}/npm.cmd` (a batch file run by `cmd`)
pub fn package_manager_path(strategy: PlatformStrategy, runtime_dir: &Path) -> PathBuf {
    match strategy {
        PlatformStrategy::Unix => runtime_dir.join("bin").join("npm"),
        PlatformStrategy::Windows => runtime_dir.join("npm.cmd"),
    }
}
