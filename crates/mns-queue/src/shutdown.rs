//! Continuation flag shared between signal handlers and the worker loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;

/// Cooperative stop request
///
/// Clones share one flag. Triggering it never interrupts a poll or a handler
/// call; the worker notices before its next poll.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Continuation predicate for [`WorkerRunner::with_continuation`]
    ///
    /// [`WorkerRunner::with_continuation`]: crate::worker::WorkerRunner::with_continuation
    pub fn predicate(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let triggered = self.triggered.clone();
        move || !triggered.load(Ordering::SeqCst)
    }
}
