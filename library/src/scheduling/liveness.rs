use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared boolean reporting whether a long running loop is currently alive
///
/// Flags are registered with the [`JobScheduler`](super::JobScheduler) and included in the status report.
/// A flag that is down degrades the overall status.
#[derive(Debug, Clone, Default)]
pub struct LivenessFlag(Arc<AtomicBool>);

impl LivenessFlag {
    /// Marks the loop as running or stopped
    pub fn set(&self, alive: bool) {
        self.0.store(alive, Ordering::SeqCst);
    }

    /// Current value
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
