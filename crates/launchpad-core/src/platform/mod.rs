//! Platform abstraction layer for cross-platform compatibility.
//!
//! All `#[cfg]` blocks for OS-specific behavior live in this module rather
//! than being scattered throughout the codebase.
//!
//! # Architecture
//!
//! - `paths` - Where the runtime and package manager live inside the runtime directory
//! - `process` - [`PlatformStrategy`]: invocation building, detached spawning,
//!   process-group termination
//!
//! # Supported Platforms
//!
//! - **Linux / macOS**: Unix strategy (process groups, POSIX signals)
//! - **Windows**: Windows strategy (`cmd /C` wrapper, new process groups, taskkill)

pub mod paths;
pub mod process;

pub use paths::{package_manager_path, runtime_executable_path};
pub use process::{PlatformStrategy, TerminateMode};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}

/// Architecture label used in runtime archive names.
pub fn archive_arch() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "x64"
    } else {
        "x86"
    }
}
