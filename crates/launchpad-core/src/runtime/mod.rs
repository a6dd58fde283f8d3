//! Project-local runtime detection and bootstrap.
//!
//! The launcher never uses a system-wide Node.js installation. It looks for the
//! runtime under `<root>/nodejs/` and, where supported, offers to fetch the
//! pinned release there when it is missing.
//!
//! # State machine
//!
//! ```text
//! Unchecked -> Found | Missing
//! Missing   -> (consent) Fetching -> Verified | FetchFailed
//! Missing   -> (declined or unsupported) Unavailable
//! ```

pub mod archive;
pub mod fetch;

use crate::config::{ProjectLayout, RuntimeConfig};
use crate::console::{self, Operator};
use crate::error::{LaunchpadError, Result};
use crate::platform::{package_manager_path, runtime_executable_path, PlatformStrategy};
use crate::runner::{CommandRunner, Invocation};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub use fetch::NodeDistFetcher;

/// A resolved runtime installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEndpoint {
    pub executable: PathBuf,
    pub package_manager: PathBuf,
    /// Output of `node --version`; empty until verified.
    pub version: String,
    /// Output of `npm --version`; empty until verified.
    pub package_manager_version: String,
}

impl RuntimeEndpoint {
    /// Endpoint at the platform's fixed locations inside `runtime_dir`, unverified.
    pub fn at(strategy: PlatformStrategy, runtime_dir: &Path) -> Self {
        Self {
            executable: runtime_executable_path(strategy, runtime_dir),
            package_manager: package_manager_path(strategy, runtime_dir),
            version: String::new(),
            package_manager_version: String::new(),
        }
    }

    /// Directory holding the runtime executable; prefixed to the child `PATH`.
    pub fn runtime_dir(&self) -> PathBuf {
        self.executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Both the runtime executable and the package manager exist.
    pub fn files_present(&self) -> bool {
        self.executable.is_file() && self.package_manager.is_file()
    }
}

/// Where the locator is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Unchecked,
    Found,
    Missing,
    Fetching,
    Verified,
    FetchFailed,
    Unavailable,
}

/// Source of a runtime archive.
#[async_trait]
pub trait RuntimeFetcher: Send + Sync {
    /// Human-readable origin, shown before the download starts.
    fn source(&self) -> String;

    /// Replace `runtime_dir` with a freshly downloaded runtime.
    async fn fetch(&self, runtime_dir: &Path) -> Result<()>;
}

/// Finds, fetches and verifies the project-local runtime.
pub struct RuntimeLocator<'a> {
    strategy: PlatformStrategy,
    runtime_dir: PathBuf,
    operator: &'a dyn Operator,
    fetcher: Option<Box<dyn RuntimeFetcher>>,
    state: RuntimeState,
}

impl<'a> RuntimeLocator<'a> {
    pub fn new(strategy: PlatformStrategy, layout: &ProjectLayout, operator: &'a dyn Operator) -> Self {
        Self {
            strategy,
            runtime_dir: layout.runtime_dir(),
            operator,
            fetcher: None,
            state: RuntimeState::Unchecked,
        }
    }

    /// Enable automatic fetching. Without a fetcher a missing runtime ends
    /// `Unavailable`.
    pub fn with_fetcher(mut self, fetcher: Option<Box<dyn RuntimeFetcher>>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Existence check only. Moves `Unchecked` to `Found` or `Missing`.
    pub fn check(&mut self) -> RuntimeEndpoint {
        let endpoint = RuntimeEndpoint::at(self.strategy, &self.runtime_dir);
        self.state = if endpoint.files_present() {
            info!("Runtime found at {}", self.runtime_dir.display());
            RuntimeState::Found
        } else {
            info!(
                "Runtime missing: expected {} and {}",
                endpoint.executable.display(),
                endpoint.package_manager.display()
            );
            RuntimeState::Missing
        };
        endpoint
    }

    /// Endpoint at the fixed path without checking or verifying anything.
    pub fn assume_present(&self) -> RuntimeEndpoint {
        RuntimeEndpoint::at(self.strategy, &self.runtime_dir)
    }

    /// Run the full state machine and return a verified endpoint.
    pub async fn resolve(&mut self) -> Result<RuntimeEndpoint> {
        console::info("Checking Node.js runtime...");
        let endpoint = self.check();

        if self.state == RuntimeState::Missing {
            console::warning(&format!(
                "Node.js was not found in {}",
                self.runtime_dir.display()
            ));
            let endpoint = self.bootstrap().await?;
            let verified = self.verify(endpoint).await?;
            self.state = RuntimeState::Verified;
            return Ok(verified);
        }

        self.verify(endpoint).await
    }

    /// Missing -> Fetching -> re-check, or Unavailable.
    async fn bootstrap(&mut self) -> Result<RuntimeEndpoint> {
        let Some(fetcher) = self.fetcher.as_deref() else {
            self.state = RuntimeState::Unavailable;
            self.print_manual_install();
            return Err(LaunchpadError::EnvironmentMissing {
                reason: format!(
                    "runtime not found in {} and automatic download is not supported on this platform",
                    self.runtime_dir.display()
                ),
            });
        };

        if !self
            .operator
            .confirm("Download and install Node.js automatically?")?
        {
            self.state = RuntimeState::Unavailable;
            info!("Operator declined runtime download");
            self.print_manual_install();
            return Err(LaunchpadError::EnvironmentMissing {
                reason: format!("runtime not found in {}", self.runtime_dir.display()),
            });
        }

        self.state = RuntimeState::Fetching;
        console::info(&format!("Downloading Node.js from {}", fetcher.source()));

        if let Err(e) = fetcher.fetch(&self.runtime_dir).await {
            if matches!(e, LaunchpadError::SignalInterrupt) {
                info!("Runtime download interrupted");
                self.state = RuntimeState::Missing;
                return Err(e);
            }
            self.state = RuntimeState::FetchFailed;
            error!("Runtime fetch failed: {}", e);
            self.print_manual_install();
            return Err(match e {
                LaunchpadError::FetchFailed { .. } => e,
                other => LaunchpadError::FetchFailed {
                    message: other.to_string(),
                },
            });
        }

        let endpoint = RuntimeEndpoint::at(self.strategy, &self.runtime_dir);
        if !endpoint.files_present() {
            self.state = RuntimeState::FetchFailed;
            self.print_manual_install();
            return Err(LaunchpadError::FetchFailed {
                message: format!(
                    "{} does not contain the runtime executables after extraction",
                    self.runtime_dir.display()
                ),
            });
        }

        console::success(&format!(
            "Node.js installed to {}",
            self.runtime_dir.display()
        ));
        Ok(endpoint)
    }

    /// Query both version strings. Any failure means the installation is
    /// present but broken.
    pub async fn verify(&mut self, mut endpoint: RuntimeEndpoint) -> Result<RuntimeEndpoint> {
        let runtime = self.strategy.runtime_invocation(&endpoint, &["--version".to_string()]);
        endpoint.version = query_version(&runtime, "Node.js", None).await?;

        let package_manager = self.strategy.build_invocation(
            &endpoint,
            &["--version".to_string()],
            &self.runtime_dir,
        );
        endpoint.package_manager_version = query_version(
            &package_manager,
            "npm",
            Some(RuntimeConfig::PACKAGE_MANAGER_VERSION_TIMEOUT),
        )
        .await?;

        info!(
            "Runtime verified: node {}, npm {}",
            endpoint.version, endpoint.package_manager_version
        );
        console::success(&format!("Node.js version: {}", endpoint.version));
        console::success(&format!("npm version: {}", endpoint.package_manager_version));

        if self.state == RuntimeState::Unchecked || self.state == RuntimeState::Missing {
            self.state = RuntimeState::Found;
        }
        Ok(endpoint)
    }

    fn print_manual_install(&self) {
        console::warning("Install Node.js manually:");
        console::warning(&format!(
            "  1. Download it from {}",
            RuntimeConfig::MANUAL_DOWNLOAD_PAGE
        ));
        console::warning(&format!(
            "  2. Extract it into {}",
            self.runtime_dir.display()
        ));
    }
}

async fn query_version(
    invocation: &Invocation,
    label: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let broken = |detail: String| {
        error!("{} check failed: {}", label, detail);
        LaunchpadError::EnvironmentMissing {
            reason: format!("{} installation is present but broken: {}", label, detail),
        }
    };

    let result = match CommandRunner::run(invocation, timeout).await {
        Ok(result) => result,
        Err(e) => return Err(broken(e.to_string())),
    };

    if !result.success() {
        return Err(broken(format!(
            "exit code {}: {}",
            result.exit_code,
            result.stderr_text()
        )));
    }

    let version = result.stdout_text();
    if version.is_empty() {
        warn!("{} --version printed nothing", label);
        return Err(broken("empty version output".to_string()));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Answer(bool);

    impl Operator for Answer {
        fn confirm(&self, _question: &str) -> Result<bool> {
            Ok(self.0)
        }
        fn acknowledge(&self, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl RuntimeFetcher for CountingFetcher {
        fn source(&self) -> String {
            "test".to_string()
        }

        async fn fetch(&self, runtime_dir: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LaunchpadError::Other("connection reset".into()));
            }
            // Leaves an empty directory behind: a broken archive.
            std::fs::create_dir_all(runtime_dir)?;
            Ok(())
        }
    }

    #[test]
    fn test_endpoint_layout() {
        let ep = RuntimeEndpoint::at(PlatformStrategy::Unix, Path::new("/srv/app/nodejs"));
        assert_eq!(ep.executable, PathBuf::from("/srv/app/nodejs/bin/node"));
        assert_eq!(ep.runtime_dir(), PathBuf::from("/srv/app/nodejs/bin"));
        assert!(ep.version.is_empty());
        assert!(!ep.files_present());
    }

    #[test]
    fn test_check_missing_when_only_runtime_present() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let bin = layout.runtime_dir().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("node"), "").unwrap();

        let operator = Answer(false);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator);
        assert_eq!(locator.state(), RuntimeState::Unchecked);
        locator.check();
        assert_eq!(locator.state(), RuntimeState::Missing);

        std::fs::write(bin.join("npm"), "").unwrap();
        locator.check();
        assert_eq!(locator.state(), RuntimeState::Found);
    }

    #[tokio::test]
    async fn test_missing_without_fetcher_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let operator = Answer(true);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator);

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::EnvironmentMissing { .. }));
        assert_eq!(locator.state(), RuntimeState::Unavailable);
    }

    #[tokio::test]
    async fn test_declined_fetch_never_downloads() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let calls = Arc::new(AtomicUsize::new(0));
        let operator = Answer(false);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator)
            .with_fetcher(Some(Box::new(CountingFetcher {
                calls: calls.clone(),
                fail: false,
            })));

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::EnvironmentMissing { .. }));
        assert_eq!(locator.state(), RuntimeState::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_is_fetch_failed() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let calls = Arc::new(AtomicUsize::new(0));
        let operator = Answer(true);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator)
            .with_fetcher(Some(Box::new(CountingFetcher {
                calls: calls.clone(),
                fail: true,
            })));

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::FetchFailed { .. }));
        assert_eq!(locator.state(), RuntimeState::FetchFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_without_executables_is_fetch_failed() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let operator = Answer(true);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator)
            .with_fetcher(Some(Box::new(CountingFetcher {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            })));

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::FetchFailed { .. }));
        assert!(layout.runtime_dir().is_dir());
    }

    struct Interrupted;

    impl Operator for Interrupted {
        fn confirm(&self, _question: &str) -> Result<bool> {
            Err(LaunchpadError::SignalInterrupt)
        }
        fn acknowledge(&self, _message: &str) -> Result<()> {
            Err(LaunchpadError::SignalInterrupt)
        }
    }

    #[tokio::test]
    async fn test_interrupted_prompt_stops_without_download() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &Interrupted)
            .with_fetcher(Some(Box::new(CountingFetcher {
                calls: calls.clone(),
                fail: false,
            })));

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::SignalInterrupt));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct InterruptedFetcher;

    #[async_trait]
    impl RuntimeFetcher for InterruptedFetcher {
        fn source(&self) -> String {
            "test".to_string()
        }

        async fn fetch(&self, _runtime_dir: &Path) -> Result<()> {
            Err(LaunchpadError::SignalInterrupt)
        }
    }

    #[tokio::test]
    async fn test_interrupted_download_is_not_fetch_failed() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let operator = Answer(true);
        let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator)
            .with_fetcher(Some(Box::new(InterruptedFetcher)));

        let err = locator.resolve().await.unwrap_err();
        assert!(matches!(err, LaunchpadError::SignalInterrupt));
        assert_eq!(locator.state(), RuntimeState::Missing);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(path: &Path, body: &str) {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        /// Fake node that answers `--version` and otherwise runs its first
        /// argument as a shell script.
        fn install_runtime(layout: &ProjectLayout, npm_version_body: &str) {
            let bin = layout.runtime_dir().join("bin");
            write_script(
                &bin.join("node"),
                "if [ \"$1\" = \"--version\" ]; then echo v18.17.1; exit 0; fi\nexec /bin/sh \"$@\"",
            );
            write_script(&bin.join("npm"), npm_version_body);
        }

        #[tokio::test]
        async fn test_resolve_reports_versions() {
            let temp_dir = TempDir::new().unwrap();
            let layout = ProjectLayout::new(temp_dir.path());
            install_runtime(&layout, "echo 9.6.7");

            let operator = Answer(false);
            let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator);
            let endpoint = locator.resolve().await.unwrap();

            assert_eq!(endpoint.version, "v18.17.1");
            assert_eq!(endpoint.package_manager_version, "9.6.7");
            assert_eq!(locator.state(), RuntimeState::Found);
        }

        #[tokio::test]
        async fn test_broken_package_manager_is_environment_missing() {
            let temp_dir = TempDir::new().unwrap();
            let layout = ProjectLayout::new(temp_dir.path());
            install_runtime(&layout, "echo 'npm ERR! cannot find module' >&2; exit 1");

            let operator = Answer(false);
            let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator);
            let err = locator.resolve().await.unwrap_err();
            assert!(matches!(err, LaunchpadError::EnvironmentMissing { .. }));
        }

        #[tokio::test]
        async fn test_empty_version_output_is_environment_missing() {
            let temp_dir = TempDir::new().unwrap();
            let layout = ProjectLayout::new(temp_dir.path());
            install_runtime(&layout, "exit 0");

            let operator = Answer(false);
            let mut locator = RuntimeLocator::new(PlatformStrategy::Unix, &layout, &operator);
            let err = locator.resolve().await.unwrap_err();
            assert!(matches!(err, LaunchpadError::EnvironmentMissing { .. }));
        }
    }
}
