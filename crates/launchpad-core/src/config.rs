//! Centralized configuration for Launchpad.
//!
//! This module provides configuration constants for the runtime bootstrap,
//! service supervision and network operations, plus the static description of
//! the project layout and the two managed services.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Launchpad";
    pub const LOG_FILE_PREFIX: &'static str = "launcher";
}

/// Timing of the supervision loop and the shutdown sequence.
pub struct LauncherConfig;

impl LauncherConfig {
    /// Wait after spawn before a service counts as started.
    pub const LAUNCH_GRACE_PERIOD: Duration = Duration::from_secs(2);
    /// Sleep between two supervisor iterations.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// How long a group gets between the graceful and the forceful signal.
    pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(1);
    /// Capacity of each per-stream output queue.
    pub const OUTPUT_QUEUE_CAPACITY: usize = 256;
    /// Upper bound on collecting an exited service's last output. Members
    /// left in the group can keep the pipes open.
    pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
}

/// Runtime (Node.js) version and probing configuration.
pub struct RuntimeConfig;

impl RuntimeConfig {
    pub const NODE_VERSION: &'static str = "18.17.1";
    pub const PACKAGE_MANAGER_VERSION_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MANUAL_DOWNLOAD_PAGE: &'static str = "https://nodejs.org/en/download/";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const NODE_DIST_BASE: &'static str = "https://nodejs.org/dist";
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const USER_AGENT: &'static str = "launchpad";
    /// How often a stalled transfer re-checks for cancellation.
    pub const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(250);
}

/// Shared directory and file names.
pub struct PathsConfig;

impl PathsConfig {
    pub const RUNTIME_DIR_NAME: &'static str = "nodejs";
    pub const BACKEND_DIR_NAME: &'static str = "backend";
    pub const FRONTEND_DIR_NAME: &'static str = "frontend";
    pub const LOGS_DIR_NAME: &'static str = "logs";
    pub const DEPENDENCIES_DIR_NAME: &'static str = "node_modules";
    pub const BACKEND_BUILD_DIR_NAME: &'static str = "dist";
    pub const MANIFEST_FILE_NAME: &'static str = "package.json";
}

/// The two services this launcher knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    Backend,
    Frontend,
}

impl ServiceName {
    /// Launch order.
    pub const ALL: [ServiceName; 2] = [ServiceName::Backend, ServiceName::Frontend];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Backend => "backend",
            ServiceName::Frontend => "frontend",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ServiceName::Backend => PathsConfig::BACKEND_DIR_NAME,
            ServiceName::Frontend => PathsConfig::FRONTEND_DIR_NAME,
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// All paths the launcher reads or writes, derived from one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::RUNTIME_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::LOGS_DIR_NAME)
    }

    pub fn service_dir(&self, service: ServiceName) -> PathBuf {
        self.root.join(service.dir_name())
    }

    /// Root-level manifest; its presence adds the root to the install list.
    pub fn root_manifest(&self) -> PathBuf {
        self.root.join(PathsConfig::MANIFEST_FILE_NAME)
    }
}

/// Static description of one service: where it lives and how it is built and started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: ServiceName,
    /// Working directory for build and start.
    pub working_dir: PathBuf,
    /// Build output checked by the build-required predicate. `None` means the
    /// service has no build step.
    pub build_output_dir: Option<PathBuf>,
    /// Package manager arguments for the build step.
    pub build_args: Vec<String>,
    /// Package manager arguments for the start step.
    pub start_args: Vec<String>,
    /// Appended to `start_args`.
    pub extra_start_args: Vec<String>,
}

impl ServiceSpec {
    /// Default specification for a named service inside `layout`.
    pub fn for_service(layout: &ProjectLayout, name: ServiceName) -> Self {
        let working_dir = layout.service_dir(name);
        match name {
            ServiceName::Backend => Self {
                name,
                build_output_dir: Some(working_dir.join(PathsConfig::BACKEND_BUILD_DIR_NAME)),
                working_dir,
                build_args: args(&["run", "build"]),
                start_args: args(&["start"]),
                extra_start_args: vec![],
            },
            ServiceName::Frontend => Self {
                name,
                working_dir,
                build_output_dir: None,
                build_args: vec![],
                start_args: args(&["run", "dev"]),
                // Bind on every interface so the dev server is reachable from the LAN.
                extra_start_args: args(&["--", "--host", "0.0.0.0"]),
            },
        }
    }

    /// True when the service has a build step and its output directory is
    /// missing or empty.
    pub fn needs_build(&self) -> bool {
        match &self.build_output_dir {
            Some(dir) => !crate::installer::dir_is_populated(dir),
            None => false,
        }
    }

    /// Full argument list for the start step.
    pub fn start_command(&self) -> Vec<String> {
        self.start_args
            .iter()
            .chain(self.extra_start_args.iter())
            .cloned()
            .collect()
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/srv/app");
        assert_eq!(layout.runtime_dir(), PathBuf::from("/srv/app/nodejs"));
        assert_eq!(layout.logs_dir(), PathBuf::from("/srv/app/logs"));
        assert_eq!(
            layout.service_dir(ServiceName::Backend),
            PathBuf::from("/srv/app/backend")
        );
        assert_eq!(layout.root_manifest(), PathBuf::from("/srv/app/package.json"));
    }

    #[test]
    fn test_frontend_start_command_binds_all_interfaces() {
        let layout = ProjectLayout::new("/srv/app");
        let spec = ServiceSpec::for_service(&layout, ServiceName::Frontend);
        assert_eq!(
            spec.start_command(),
            vec!["run", "dev", "--", "--host", "0.0.0.0"]
        );
        assert!(!spec.needs_build());
    }

    #[test]
    fn test_backend_needs_build_until_dist_is_populated() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let spec = ServiceSpec::for_service(&layout, ServiceName::Backend);
        assert!(spec.needs_build());

        let dist = layout.service_dir(ServiceName::Backend).join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        assert!(spec.needs_build(), "empty dist still needs a build");

        std::fs::write(dist.join("index.js"), "").unwrap();
        assert!(!spec.needs_build());
    }

    #[test]
    fn test_service_names() {
        assert_eq!(ServiceName::ALL[0], ServiceName::Backend);
        assert_eq!(ServiceName::Frontend.to_string(), "frontend");
    }
}
