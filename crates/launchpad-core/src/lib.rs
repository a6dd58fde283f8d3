//! Launchpad Core - runtime bootstrap and process supervision for a
//! two-service Node.js project.
//!
//! The crate checks for a project-local Node.js runtime (fetching it where
//! supported), installs dependencies, builds and starts the `backend` and
//! `frontend` services in their own process groups, and supervises them until
//! they exit or the launcher is interrupted.
//!
//! # Example
//!
//! ```rust,ignore
//! use launchpad_core::{
//!     CancellationToken, LaunchOptions, LaunchSession, PlatformStrategy, ProjectLayout,
//!     Supervisor, TerminalOperator,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let strategy = PlatformStrategy::current();
//!     let cancel = CancellationToken::new();
//!     let operator = TerminalOperator::new(cancel.clone());
//!     let mut session = LaunchSession::new(
//!         ProjectLayout::new("."),
//!         strategy,
//!         LaunchOptions::default(),
//!         &operator,
//!         cancel,
//!     );
//!     let mut supervisor = Supervisor::new(strategy);
//!     std::process::exit(session.run(&mut supervisor).await);
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod console;
pub mod error;
pub mod installer;
pub mod launcher;
pub mod platform;
pub mod runner;
pub mod runtime;
pub mod session;
pub mod supervisor;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{AppConfig, ProjectLayout, ServiceName, ServiceSpec};
pub use console::{Operator, TerminalOperator};
pub use error::{LaunchpadError, Result};
pub use installer::{DependencyInstaller, InstallOutcome};
pub use launcher::ServiceLauncher;
pub use platform::{PlatformStrategy, TerminateMode};
pub use runner::{CommandResult, CommandRunner, Invocation};
pub use runtime::{NodeDistFetcher, RuntimeEndpoint, RuntimeFetcher, RuntimeLocator, RuntimeState};
pub use session::{LaunchOptions, LaunchReport, LaunchSession};
pub use supervisor::{
    CapturedOutput, ManagedProcess, OutputSink, OutputStream, ProcessState, Supervisor,
    SupervisorExit, TerminalSink,
};
