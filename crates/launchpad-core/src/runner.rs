//! External command execution.
//!
//! An [`Invocation`] is a fully resolved command line: program, arguments,
//! working directory and environment overrides. The platform strategy builds
//! invocations; this module only executes them.
//!
//! Two execution modes exist:
//! - [`CommandRunner::run`] waits for completion and buffers all output
//!   (install, build and version queries).
//! - [`CommandRunner::spawn_streaming`] hands back a live child whose pipes
//!   are consumed by the supervisor (long-running services).

use crate::error::{LaunchpadError, Result};
use crate::platform::PlatformStrategy;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, OsString)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up an override set on this invocation.
    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Program name used in log lines and errors.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code; `-1` when the process was ended by a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout decoded lossily and trimmed.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Stderr decoded lossily and trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Executes invocations.
pub struct CommandRunner;

impl CommandRunner {
    /// Run a command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`CommandResult::exit_code`]. With a `timeout`, the process is killed
    /// once the bound is exceeded and `Timeout` is returned.
    pub async fn run(invocation: &Invocation, timeout: Option<Duration>) -> Result<CommandResult> {
        debug!(
            "Running: {} in {:?}",
            invocation,
            invocation.working_dir.as_deref()
        );

        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the pending wait on timeout kills the child.
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| LaunchpadError::Spawn {
            program: invocation.program_name(),
            source: e,
        })?;

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{} timed out after {:?}, killed", invocation, limit);
                    return Err(LaunchpadError::Timeout {
                        program: invocation.program_name(),
                        timeout: limit,
                    });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| LaunchpadError::Io {
            message: format!("Failed to wait for {}: {}", invocation.program_name(), e),
            path: invocation.working_dir.clone(),
            source: Some(e),
        })?;

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        };
        debug!("{} exited with code {}", invocation, result.exit_code);
        Ok(result)
    }

    /// Spawn a long-running command with piped output in its own process group.
    pub fn spawn_streaming(strategy: PlatformStrategy, invocation: &Invocation) -> Result<Child> {
        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        strategy.spawn_detached(&mut cmd);

        cmd.spawn().map_err(|e| LaunchpadError::Spawn {
            program: invocation.program_name(),
            source: e,
        })
    }
}
