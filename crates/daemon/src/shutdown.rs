//! Cooperative shutdown signaling for the polling loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between the daemon and its loops.
///
/// Observed only at cycle boundaries, never mid-cycle; a blocking
/// external-tool call already in flight is not preemptible.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that every loop holding a clone of this token exit at its
    /// next cycle boundary.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
