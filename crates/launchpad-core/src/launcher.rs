//! Service launching.
//!
//! A launch runs the build step when the service needs one, spawns the start
//! command detached in its own process group, and confirms the process is still
//! alive after a grace period. Only a process that survives is handed back for
//! supervision.

use crate::config::{LauncherConfig, ServiceSpec};
use crate::console;
use crate::error::{LaunchpadError, Result};
use crate::platform::{PlatformStrategy, TerminateMode};
use crate::runner::CommandRunner;
use crate::runtime::RuntimeEndpoint;
use crate::supervisor::{CapturedOutput, ManagedProcess, OutputStream, ProcessState};
use std::time::Duration;
use tracing::{error, info, warn};

/// Starts services with a resolved runtime.
pub struct ServiceLauncher<'a> {
    strategy: PlatformStrategy,
    endpoint: &'a RuntimeEndpoint,
    grace_period: Duration,
}

impl<'a> ServiceLauncher<'a> {
    pub fn new(strategy: PlatformStrategy, endpoint: &'a RuntimeEndpoint) -> Self {
        Self {
            strategy,
            endpoint,
            grace_period: LauncherConfig::LAUNCH_GRACE_PERIOD,
        }
    }

    /// Override the startup grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Build if needed, then start the service.
    ///
    /// `BuildFailed` means the start command never ran. `LaunchFailed` means
    /// the start command could not be spawned or exited within the grace
    /// period.
    pub async fn launch(&self, spec: &ServiceSpec) -> Result<ManagedProcess> {
        let service = spec.name.to_string();

        if spec.needs_build() {
            self.build(spec).await?;
        }

        console::info(&format!("Starting {}...", service));
        let invocation =
            self.strategy
                .build_invocation(self.endpoint, &spec.start_command(), &spec.working_dir);
        info!("Starting {}: {}", service, invocation);

        let child = CommandRunner::spawn_streaming(self.strategy, &invocation).map_err(|e| {
            error!("Failed to spawn {}: {}", service, e);
            LaunchpadError::LaunchFailed {
                service: service.clone(),
                message: e.to_string(),
            }
        })?;
        let mut process = ManagedProcess::attach(spec.name, child)?;

        tokio::time::sleep(self.grace_period).await;

        if process.poll_exit()? {
            self.reap_group(&process);
            let output = CapturedOutput::new();
            process
                .collect_output(&mut output.clone(), LauncherConfig::OUTPUT_DRAIN_TIMEOUT)
                .await;
            let stderr = output.text_of(spec.name, OutputStream::Stderr);

            let code = match process.state() {
                ProcessState::Exited(Some(code)) => code.to_string(),
                _ => "none (signal)".to_string(),
            };
            let mut message = format!("exited during startup with code {}", code);
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(&stderr.join("\n"));
            }
            error!("{} {}", service, message);
            return Err(LaunchpadError::LaunchFailed { service, message });
        }

        info!("{} started (pid {})", service, process.pid());
        console::success(&format!("{} started (pid {})", service, process.pid()));
        Ok(process)
    }

    async fn build(&self, spec: &ServiceSpec) -> Result<()> {
        let service = spec.name.to_string();
        console::info(&format!("Building {}...", service));

        let invocation =
            self.strategy
                .build_invocation(self.endpoint, &spec.build_args, &spec.working_dir);
        info!("Building {}: {}", service, invocation);

        let result = CommandRunner::run(&invocation, None).await.map_err(|e| {
            LaunchpadError::BuildFailed {
                service: service.clone(),
                stderr: e.to_string(),
            }
        })?;

        if !result.success() {
            let stderr = result.stderr_text();
            error!(
                "Build of {} failed with exit code {}: {}",
                service, result.exit_code, stderr
            );
            return Err(LaunchpadError::BuildFailed { service, stderr });
        }

        console::success(&format!("{} build complete", service));
        Ok(())
    }

    /// Kill whatever the exited leader left behind in its group.
    fn reap_group(&self, process: &ManagedProcess) {
        if !self.strategy.group_has_members(process.pgid()) {
            return;
        }
        if let Err(e) = self
            .strategy
            .terminate_group(process.pgid(), TerminateMode::Forceful)
        {
            warn!(
                "Failed to clean up process group {} of {}: {}",
                process.pgid(),
                process.label(),
                e
            );
        }
    }
}
