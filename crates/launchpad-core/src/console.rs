//! Operator-facing terminal output.
//!
//! Logs go through `tracing`; these helpers print the colored status lines the
//! operator reads. Interactive questions go through the [`Operator`] trait so
//! the bootstrap can run unattended in tests.

use crate::cancel::CancellationToken;
use crate::config::LauncherConfig;
use crate::error::Result;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::Duration;

/// Informational step (blue).
pub fn info(message: &str) {
    println!("{}", message.blue());
}

/// Completed step (green).
pub fn success(message: &str) {
    println!("{}", message.green());
}

/// Something the operator should notice (yellow).
pub fn warning(message: &str) {
    println!("{}", message.yellow());
}

/// Hard failure (red).
pub fn failure(message: &str) {
    println!("{}", message.red());
}

/// Visual break between output blocks.
pub fn separator() {
    println!("\n{}\n", "-".repeat(50).blue());
}

/// Interaction with the person running the launcher.
///
/// Both calls return `SignalInterrupt` when the launcher is asked to stop
/// while waiting for an answer.
pub trait Operator: Send + Sync {
    /// Ask a yes/no question. Anything other than an explicit yes is a no.
    fn confirm(&self, question: &str) -> Result<bool>;

    /// Show a message and wait until the operator acknowledges it, so the
    /// terminal window stays open for inspection.
    fn acknowledge(&self, message: &str) -> Result<()>;
}

/// [`Operator`] backed by stdin/stdout.
///
/// Input is read on a helper thread so a cancellation request ends the wait
/// even though the read itself cannot be interrupted.
#[derive(Debug, Default, Clone)]
pub struct TerminalOperator {
    cancel: CancellationToken,
}

impl TerminalOperator {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    fn read_line(&self) -> Result<String> {
        let (tx, rx) = std_mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_err() {
                line.clear();
            }
            let _ = tx.send(line);
        });
        wait_for_line(&rx, &self.cancel, LauncherConfig::POLL_INTERVAL)
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, question: &str) -> Result<bool> {
        print!("{} ", format!("{} (y/n):", question).yellow());
        let _ = std::io::stdout().flush();
        Ok(is_yes(&self.read_line()?))
    }

    fn acknowledge(&self, message: &str) -> Result<()> {
        print!("{}", message.blue());
        let _ = std::io::stdout().flush();
        self.read_line().map(|_| ())
    }
}

/// Wait for a line from `rx`, checking `cancel` every `interval`.
///
/// A closed channel (stdin gone) counts as an empty answer.
fn wait_for_line(
    rx: &std_mpsc::Receiver<String>,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<String> {
    loop {
        cancel.check()?;
        match rx.recv_timeout(interval) {
            Ok(line) => return Ok(line),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(String::new()),
        }
    }
}

/// Parse a yes/no answer.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  Yes "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_wait_for_line_returns_answer() {
        let (tx, rx) = std_mpsc::channel();
        tx.send("y\n".to_string()).unwrap();
        let line =
            wait_for_line(&rx, &CancellationToken::new(), Duration::from_millis(10)).unwrap();
        assert_eq!(line, "y\n");
    }

    #[test]
    fn test_wait_for_line_closed_input_is_empty_answer() {
        let (tx, rx) = std_mpsc::channel::<String>();
        drop(tx);
        let line =
            wait_for_line(&rx, &CancellationToken::new(), Duration::from_millis(10)).unwrap();
        assert!(line.is_empty());
    }

    #[test]
    fn test_cancel_ends_wait_without_input() {
        let (_tx, rx) = std_mpsc::channel::<String>();
        let cancel = CancellationToken::new();
        let handler_side = cancel.clone();
        let signaller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handler_side.cancel();
        });

        let started = std::time::Instant::now();
        let err = wait_for_line(&rx, &cancel, Duration::from_millis(10)).unwrap_err();
        signaller.join().unwrap();

        assert!(matches!(err, crate::LaunchpadError::SignalInterrupt));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
