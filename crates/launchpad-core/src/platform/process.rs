//! Platform-specific process management.
//!
//! [`PlatformStrategy`] is selected once at startup and encapsulates every
//! difference between the two OS families:
//! - how a package manager command line is built,
//! - how a child is detached into its own process group,
//! - how a whole process group is signalled.

use crate::error::{LaunchpadError, Result};
use crate::runner::Invocation;
use crate::runtime::RuntimeEndpoint;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How hard to ask a process group to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateMode {
    /// SIGTERM on Unix, CTRL_BREAK on Windows.
    Graceful,
    /// SIGKILL on Unix, `taskkill /F /T` on Windows.
    Forceful,
}

/// Process strategy for one OS family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformStrategy {
    Unix,
    Windows,
}

impl PlatformStrategy {
    /// Strategy for the platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformStrategy::Windows
        } else {
            PlatformStrategy::Unix
        }
    }

    /// Build a package manager command line, e.g. `npm run build`.
    ///
    /// # Platform Behavior
    /// - **Unix**: `<node> <npm> args...`; npm is a runtime script
    /// - **Windows**: `cmd /C <npm.cmd> args...`; npm is a batch file
    pub fn build_invocation(
        &self,
        endpoint: &RuntimeEndpoint,
        args: &[String],
        working_dir: &Path,
    ) -> Invocation {
        let invocation = match self {
            PlatformStrategy::Unix => {
                Invocation::new(&endpoint.executable).arg(&endpoint.package_manager)
            }
            PlatformStrategy::Windows => Invocation::new("cmd")
                .arg("/C")
                .arg(&endpoint.package_manager),
        };
        Self::with_runtime_env(invocation.args(args), endpoint).current_dir(working_dir)
    }

    /// Build a command line that runs the runtime executable itself.
    pub fn runtime_invocation(&self, endpoint: &RuntimeEndpoint, args: &[String]) -> Invocation {
        Self::with_runtime_env(Invocation::new(&endpoint.executable).args(args), endpoint)
    }

    /// Prefix the search path with the runtime directory and point
    /// `NODE_PATH` at it.
    fn with_runtime_env(invocation: Invocation, endpoint: &RuntimeEndpoint) -> Invocation {
        let runtime_dir = endpoint.runtime_dir();
        let search_path = prefixed_search_path(&runtime_dir, std::env::var_os("PATH"));
        invocation
            .env("PATH", search_path)
            .env("NODE_PATH", runtime_dir.into_os_string())
    }

    /// Place the child in its own process group so the whole group can be
    /// signalled together later.
    pub fn spawn_detached(&self, cmd: &mut tokio::process::Command) {
        match self {
            PlatformStrategy::Unix => detach_unix(cmd),
            PlatformStrategy::Windows => detach_windows(cmd),
        }
    }

    /// Signal every process in the group led by `pgid`.
    ///
    /// A group that no longer exists is not an error.
    pub fn terminate_group(&self, pgid: u32, mode: TerminateMode) -> Result<()> {
        debug!("Sending {:?} termination to process group {}", mode, pgid);
        match self {
            PlatformStrategy::Unix => signal_group_unix(pgid, mode),
            PlatformStrategy::Windows => signal_group_windows(pgid, mode),
        }
    }

    /// Whether any process other than a reaped leader remains in the group.
    ///
    /// On Windows the tree is killed by `taskkill /T`, so only the leader's
    /// own exit status is meaningful and this returns `false`.
    pub fn group_has_members(&self, pgid: u32) -> bool {
        match self {
            PlatformStrategy::Unix => group_has_members_unix(pgid),
            PlatformStrategy::Windows => false,
        }
    }

    /// Whether the runtime archive can be fetched automatically here.
    pub fn supports_runtime_fetch(&self) -> bool {
        matches!(self, PlatformStrategy::Windows)
    }
}

/// `dir` followed by the entries of `current`, unless `dir` is already listed.
pub fn prefixed_search_path(dir: &Path, current: Option<OsString>) -> OsString {
    let mut entries: Vec<PathBuf> = current
        .as_ref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    if entries.iter().any(|entry| entry == dir) {
        return current.unwrap_or_default();
    }

    entries.insert(0, dir.to_path_buf());
    match std::env::join_paths(entries) {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Cannot add {} to PATH: {}", dir.display(), e);
            current.unwrap_or_default()
        }
    }
}

#[cfg(unix)]
fn detach_unix(cmd: &mut tokio::process::Command) {
    // pgid 0 makes the child the leader of a new group.
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_unix(_cmd: &mut tokio::process::Command) {}

#[cfg(windows)]
fn detach_windows(cmd: &mut tokio::process::Command) {
    use windows_sys::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(windows))]
fn detach_windows(_cmd: &mut tokio::process::Command) {}

#[cfg(unix)]
fn signal_group_unix(pgid: u32, mode: TerminateMode) -> Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = match mode {
        TerminateMode::Graceful => Signal::SIGTERM,
        TerminateMode::Forceful => Signal::SIGKILL,
    };

    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) => Ok(()),
        // Group is already gone
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(LaunchpadError::Other(format!(
            "Failed to send {:?} to process group {}: {}",
            signal, pgid, e
        ))),
    }
}

#[cfg(not(unix))]
fn signal_group_unix(pgid: u32, _mode: TerminateMode) -> Result<()> {
    Err(LaunchpadError::Other(format!(
        "Unix process groups are not available on this platform (group {})",
        pgid
    )))
}

#[cfg(unix)]
fn group_has_members_unix(pgid: u32) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // Signal 0 only checks for existence. EPERM still means "alive".
    !matches!(
        killpg(Pid::from_raw(pgid as i32), None::<Signal>),
        Err(nix::errno::Errno::ESRCH)
    )
}

#[cfg(not(unix))]
fn group_has_members_unix(_pgid: u32) -> bool {
    false
}

#[cfg(windows)]
fn signal_group_windows(pgid: u32, mode: TerminateMode) -> Result<()> {
    match mode {
        TerminateMode::Graceful => send_ctrl_break(pgid),
        TerminateMode::Forceful => taskkill_tree(pgid),
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn send_ctrl_break(pgid: u32) -> Result<()> {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

    // SAFETY: GenerateConsoleCtrlEvent takes plain integers and has no
    // memory-safety preconditions. `pgid` is the id of a group we created
    // with CREATE_NEW_PROCESS_GROUP.
    let ok = unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pgid) };
    if ok == 0 {
        return Err(LaunchpadError::Other(format!(
            "Failed to send CTRL_BREAK to process group {}: {}",
            pgid,
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(windows)]
fn taskkill_tree(pid: u32) -> Result<()> {
    use std::process::Command;

    // /F (force) and /T (tree - kill child processes too)
    let output = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .output()
        .map_err(|e| LaunchpadError::Other(format!("Failed to run taskkill: {}", e)))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    // "not found" errors are OK - process already dead
    if stderr.contains("not found") || stderr.contains("not running") {
        Ok(())
    } else {
        Err(LaunchpadError::Other(format!(
            "taskkill failed for {}: {}",
            pid,
            stderr.trim()
        )))
    }
}

#[cfg(not(windows))]
fn signal_group_windows(pgid: u32, _mode: TerminateMode) -> Result<()> {
    Err(LaunchpadError::Other(format!(
        "Windows process groups are not available on this platform (group {})",
        pgid
    )))
}
