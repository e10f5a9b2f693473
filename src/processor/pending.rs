//! Drain tracking.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Count of outstanding items with a wake-up when it reaches zero
#[derive(Debug, Default)]
pub(crate) struct PendingCounter {
    count: AtomicUsize,
    notify: Notify,
}

impl PendingCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Saturates at zero
    pub(crate) fn decrement(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        if previous <= 1 {
            self.notify.notify_waiters();
        }
    }

    /// Drop everything outstanding and wake waiters
    pub(crate) fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait until the count is zero
    pub(crate) async fn wait_zero(&self) {
        loop {
            // Register before checking so a decrement in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.get() == 0 {
                return;
            }
            notified.await;
        }
    }
}
