//! Shutdown request flag shared between the signal handler and the supervisor.
//!
//! The signal handler never performs cleanup itself. It only flips this token;
//! the supervisor loop observes it between iterations and runs the shutdown
//! sequence on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token for cooperative shutdown.
///
/// Clones share state: cancelling any clone is observed by all of them.
///
/// # Example
///
/// ```
/// use launchpad_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler_side = token.clone();
///
/// // e.g. from a ctrl-c handler
/// handler_side.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from a signal-handling thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `SignalInterrupt` if cancellation has been requested.
    ///
    /// Used between bootstrap steps, where a pending signal should stop the
    /// sequence before the next external command starts.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::LaunchpadError::SignalInterrupt)
        } else {
            Ok(())
        }
    }
}
