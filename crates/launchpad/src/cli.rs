//! Command-line arguments.

use clap::Parser;
use launchpad_core::LaunchOptions;
use std::path::PathBuf;

const HELP_TEXT: &str = "\
Features:
  1. Checks for the project-local Node.js runtime and offers to install it
  2. Installs backend and frontend dependencies when they are missing
  3. Builds and starts the backend and frontend services together
  4. Stops every service when the launcher is closed

Environment:
  Node.js is expected in the nodejs/ directory of the project root
  (extract the official release archive there). A system-wide
  installation is never used.

Controls:
  Press Ctrl+C to stop all services and exit.

Logs:
  One log file per run is written to logs/launcher_YYYYMMDD_HHMMSS.log";

#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(version)]
#[command(about = "Unified launcher for the backend and frontend services")]
#[command(after_help = HELP_TEXT)]
pub struct Args {
    /// Skip environment checks and dependency installation
    #[arg(long)]
    pub no_check: bool,

    /// Start only the frontend service
    #[arg(long)]
    pub frontend_only: bool,

    /// Start only the backend service
    #[arg(long)]
    pub backend_only: bool,

    /// Enable debug logging (also echoed to stderr)
    #[arg(short, long)]
    pub debug: bool,

    /// Project root directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

impl Args {
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions::from_flags(self.no_check, self.frontend_only, self.backend_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use launchpad_core::ServiceName;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_start_everything() {
        let args = Args::try_parse_from(["launchpad"]).unwrap();
        let options = args.launch_options();
        assert!(!options.skip_checks);
        assert_eq!(
            options.selected_services(),
            vec![ServiceName::Backend, ServiceName::Frontend]
        );
        assert!(args.root.is_none());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "launchpad",
            "--no-check",
            "--backend-only",
            "--root",
            "/srv/app",
        ])
        .unwrap();
        assert!(args.launch_options().skip_checks);
        assert_eq!(
            args.launch_options().selected_services(),
            vec![ServiceName::Backend]
        );
        assert_eq!(args.root, Some(PathBuf::from("/srv/app")));
    }

    #[test]
    fn test_both_only_flags_are_accepted() {
        let args = Args::try_parse_from(["launchpad", "--frontend-only", "--backend-only"]).unwrap();
        assert!(args.launch_options().selected_services().is_empty());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Args::try_parse_from(["launchpad", "--restart-always"]).is_err());
    }
}
