//! Delay scheduler.
//!
//! Each continuation is its own tokio task sleeping on the runtime timer, so
//! a pending delay never holds an execution lock or a worker thread.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Schedules continuations after a wait.
#[derive(Debug, Clone, Default)]
pub struct DelayScheduler {
    pending: Arc<AtomicUsize>,
}

/// Decrements the pending count when the task ends, however it ends.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DelayScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `continuation` once `wait` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, wait: Duration, continuation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending));
        tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(wait).await;
            continuation.await;
        });
    }

    /// Returns the number of continuations that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
