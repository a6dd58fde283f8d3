//! One launcher invocation from environment check to exit code.
//!
//! Bootstrap failures stop the run before anything is started. Service
//! failures are collected and reported once supervision ends, so a healthy
//! service keeps running while its sibling is broken.

use crate::cancel::CancellationToken;
use crate::config::{LauncherConfig, ProjectLayout, ServiceName, ServiceSpec};
use crate::console::{self, Operator};
use crate::error::{LaunchpadError, Result};
use crate::installer::DependencyInstaller;
use crate::launcher::ServiceLauncher;
use crate::platform::PlatformStrategy;
use crate::runtime::{RuntimeEndpoint, RuntimeFetcher, RuntimeLocator};
use crate::supervisor::{Supervisor, SupervisorExit};
use std::time::Duration;
use tracing::{error, info, warn};

const ACKNOWLEDGE_PROMPT: &str = "Press Enter to continue...";

/// Which parts of the run are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Skip runtime verification and dependency installation.
    pub skip_checks: bool,
    pub start_backend: bool,
    pub start_frontend: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from_flags(false, false, false)
    }
}

impl LaunchOptions {
    /// Each `*_only` flag excludes the other service. Both together exclude
    /// both.
    pub fn from_flags(no_check: bool, frontend_only: bool, backend_only: bool) -> Self {
        Self {
            skip_checks: no_check,
            start_backend: !frontend_only,
            start_frontend: !backend_only,
        }
    }

    /// Selected services in launch order.
    pub fn selected_services(&self) -> Vec<ServiceName> {
        ServiceName::ALL
            .into_iter()
            .filter(|name| match name {
                ServiceName::Backend => self.start_backend,
                ServiceName::Frontend => self.start_frontend,
            })
            .collect()
    }
}

/// Result of [`LaunchSession::launch_services`].
#[derive(Debug, Default)]
pub struct LaunchReport {
    /// Services handed to the supervisor, with their pids.
    pub launched: Vec<(ServiceName, u32)>,
    /// Services that did not start, with the reason.
    pub failed: Vec<(ServiceName, LaunchpadError)>,
}

/// Drives bootstrap, launch and supervision for one project root.
pub struct LaunchSession<'a> {
    layout: ProjectLayout,
    strategy: PlatformStrategy,
    options: LaunchOptions,
    operator: &'a dyn Operator,
    fetcher: Option<Box<dyn RuntimeFetcher>>,
    cancel: CancellationToken,
    grace_period: Duration,
}

impl<'a> LaunchSession<'a> {
    pub fn new(
        layout: ProjectLayout,
        strategy: PlatformStrategy,
        options: LaunchOptions,
        operator: &'a dyn Operator,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            layout,
            strategy,
            options,
            operator,
            fetcher: None,
            cancel,
            grace_period: LauncherConfig::LAUNCH_GRACE_PERIOD,
        }
    }

    /// Source used when the runtime is missing.
    pub fn with_fetcher(mut self, fetcher: Option<Box<dyn RuntimeFetcher>>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Resolve the runtime and install dependencies.
    pub async fn bootstrap(&mut self) -> Result<RuntimeEndpoint> {
        let mut locator = RuntimeLocator::new(self.strategy, &self.layout, self.operator)
            .with_fetcher(self.fetcher.take());

        if self.options.skip_checks {
            warn!("Environment checks skipped");
            console::warning("Skipping environment checks");
            return Ok(locator.assume_present());
        }

        self.cancel.check()?;
        let endpoint = locator.resolve().await?;
        console::separator();
        console::success("Environment check passed");

        self.cancel.check()?;
        DependencyInstaller::new(self.strategy, &endpoint)
            .ensure_all(&self.layout, &self.cancel)
            .await?;
        Ok(endpoint)
    }

    /// Launch every selected service and register the survivors.
    pub async fn launch_services(
        &self,
        endpoint: &RuntimeEndpoint,
        supervisor: &mut Supervisor,
    ) -> LaunchReport {
        let mut report = LaunchReport::default();
        let selected = self.options.selected_services();
        if selected.is_empty() {
            info!("No services selected");
            console::warning("No services selected, nothing to start");
            return report;
        }

        console::info("Starting application...");
        let launcher =
            ServiceLauncher::new(self.strategy, endpoint).with_grace_period(self.grace_period);

        for name in selected {
            if self.cancel.is_cancelled() {
                info!("Termination requested, not starting {}", name);
                break;
            }

            let spec = ServiceSpec::for_service(&self.layout, name);
            let launched = match launcher.launch(&spec).await {
                Ok(process) => {
                    let pid = process.pid();
                    supervisor.register(process).map(|()| pid)
                }
                Err(e) => Err(e),
            };

            match launched {
                Ok(pid) => report.launched.push((name, pid)),
                Err(e) => {
                    error!("{} failed to start: {}", name, e);
                    console::failure(&format!("{} failed to start: {}", name, e));
                    report.failed.push((name, e));
                }
            }
        }

        if !report.launched.is_empty() {
            console::separator();
            for (name, pid) in &report.launched {
                info!("{} running with pid {}", name, pid);
                console::success(&format!("{}: pid {}", name, pid));
            }
        }
        report
    }

    /// Full run. Returns the process exit code.
    pub async fn run(&mut self, supervisor: &mut Supervisor) -> i32 {
        let endpoint = match self.bootstrap().await {
            Ok(endpoint) => endpoint,
            // A command killed by the same Ctrl+C fails on its own; the signal wins.
            Err(e) if matches!(e, LaunchpadError::SignalInterrupt) || self.cancel.is_cancelled() => {
                info!("Interrupted during bootstrap: {}", e);
                return 0;
            }
            Err(e) => {
                error!("Bootstrap failed: {}", e);
                console::separator();
                console::failure(&e.to_string());
                console::warning("Resolve the problem above before starting again");
                return self.acknowledge_failure(e.exit_code());
            }
        };

        let report = self.launch_services(&endpoint, supervisor).await;

        if !supervisor.is_empty() {
            console::success("Services started, press Ctrl+C to stop all services");
            match supervisor.run(&self.cancel).await {
                Ok(SupervisorExit::Interrupted) => return 0,
                Ok(SupervisorExit::AllExited) => {}
                Err(e) => {
                    console::separator();
                    console::failure(&format!("Supervision stopped: {}", e));
                    return self.acknowledge_failure(e.exit_code());
                }
            }
        }

        if self.cancel.is_cancelled() {
            supervisor.stop_all().await;
            return 0;
        }

        if !report.failed.is_empty() {
            console::separator();
            console::failure("Application start failed");
            return self.acknowledge_failure(1);
        }
        0
    }

    /// Hold the failure on screen. A signal while waiting still exits
    /// cleanly.
    fn acknowledge_failure(&self, code: i32) -> i32 {
        match self.operator.acknowledge(ACKNOWLEDGE_PROMPT) {
            Ok(()) => code,
            Err(LaunchpadError::SignalInterrupt) => {
                info!("Interrupted while waiting for acknowledgement");
                0
            }
            Err(e) => {
                warn!("Acknowledgement failed: {}", e);
                code
            }
        }
    }
}
