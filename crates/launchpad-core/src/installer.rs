//! Project dependency bootstrap.
//!
//! A project counts as installed when its `node_modules` directory exists and
//! is non-empty. Anything else gets a `npm install` in that directory.

use crate::cancel::CancellationToken;
use crate::config::{PathsConfig, ProjectLayout, ServiceName};
use crate::console;
use crate::error::{LaunchpadError, Result};
use crate::platform::PlatformStrategy;
use crate::runner::CommandRunner;
use crate::runtime::RuntimeEndpoint;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// True when `path` is a directory with at least one entry.
pub fn dir_is_populated(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// One directory that gets its dependencies installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub label: String,
    pub dir: PathBuf,
}

impl Project {
    pub fn dependencies_dir(&self) -> PathBuf {
        self.dir.join(PathsConfig::DEPENDENCIES_DIR_NAME)
    }

    pub fn is_installed(&self) -> bool {
        dir_is_populated(&self.dependencies_dir())
    }
}

/// Install order: backend, frontend, then the root when it has a manifest.
pub fn projects(layout: &ProjectLayout) -> Vec<Project> {
    let mut list: Vec<Project> = ServiceName::ALL
        .iter()
        .map(|name| Project {
            label: name.as_str().to_string(),
            dir: layout.service_dir(*name),
        })
        .collect();

    if layout.root_manifest().is_file() {
        list.push(Project {
            label: "root".to_string(),
            dir: layout.root().to_path_buf(),
        });
    }
    list
}

/// What [`DependencyInstaller::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed,
}

/// Runs `npm install` where needed.
pub struct DependencyInstaller<'a> {
    strategy: PlatformStrategy,
    endpoint: &'a RuntimeEndpoint,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(strategy: PlatformStrategy, endpoint: &'a RuntimeEndpoint) -> Self {
        Self { strategy, endpoint }
    }

    /// Install one project if its dependency directory is missing or empty.
    pub async fn ensure(&self, project: &Project) -> Result<InstallOutcome> {
        if project.is_installed() {
            info!("{} dependencies already installed", project.label);
            console::success(&format!(
                "{} dependencies already installed",
                project.label
            ));
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        console::info(&format!("Installing {} dependencies...", project.label));
        info!(
            "Installing dependencies for {} in {}",
            project.label,
            project.dir.display()
        );

        let invocation =
            self.strategy
                .build_invocation(self.endpoint, &["install".to_string()], &project.dir);
        let result = CommandRunner::run(&invocation, None)
            .await
            .map_err(|e| LaunchpadError::InstallFailed {
                project: project.label.clone(),
                stderr: e.to_string(),
            })?;

        if !result.success() {
            let stderr = result.stderr_text();
            error!(
                "npm install failed for {} (exit code {}): {}",
                project.label, result.exit_code, stderr
            );
            return Err(LaunchpadError::InstallFailed {
                project: project.label.clone(),
                stderr,
            });
        }

        console::success(&format!("{} dependencies installed", project.label));
        Ok(InstallOutcome::Installed)
    }

    /// Install every project in order, stopping at the first failure.
    ///
    /// A pending cancellation is honored between projects, never during one.
    pub async fn ensure_all(
        &self,
        layout: &ProjectLayout,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Project, InstallOutcome)>> {
        let mut outcomes = Vec::new();
        for project in projects(layout) {
            cancel.check()?;
            let outcome = self.ensure(&project).await?;
            outcomes.push((project, outcome));
        }
        Ok(outcomes)
    }
}
