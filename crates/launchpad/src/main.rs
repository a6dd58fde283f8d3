//! Launchpad - unified launcher for the backend and frontend services.
//!
//! Checks the project-local Node.js runtime, installs dependencies, starts both
//! services and keeps them under one parent until Ctrl+C.

mod banner;
mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use launchpad_core::{
    AppConfig, CancellationToken, LaunchSession, NodeDistFetcher, PlatformStrategy, ProjectLayout,
    RuntimeFetcher, Supervisor, TerminalOperator,
};
use std::process::ExitCode;
use tracing::{info, warn};

fn main() -> ExitCode {
    let args = cli::Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Args) -> Result<i32> {
    let root = match args.root.clone() {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let layout = ProjectLayout::new(&root);

    let log_path = logging::init(&layout.logs_dir(), args.debug)?;
    banner::print_banner();
    info!("{} starting in {}", AppConfig::APP_NAME, root.display());
    info!("Logging to {}", log_path.display());

    // The handler only flags the request; the supervisor performs the cleanup.
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if !handler_token.is_cancelled() {
            warn!("Termination signal received");
        }
        handler_token.cancel();
    })
    .context("Failed to install the termination handler")?;

    let strategy = PlatformStrategy::current();
    let fetcher = NodeDistFetcher::for_platform(strategy)?.map(|fetcher| {
        Box::new(fetcher.with_cancellation(cancel.clone())) as Box<dyn RuntimeFetcher>
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let operator = TerminalOperator::new(cancel.clone());
    let code = runtime.block_on(async {
        let mut session =
            LaunchSession::new(layout, strategy, args.launch_options(), &operator, cancel)
                .with_fetcher(fetcher);
        let mut supervisor = Supervisor::new(strategy);
        session.run(&mut supervisor).await
    });

    info!("Launcher exiting with code {}", code);
    Ok(code)
}
