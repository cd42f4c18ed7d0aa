//! Recording presentation sink for testing.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::application::ports::{PresentationSink, Snapshot};

/// Keeps every snapshot it is shown.
#[derive(Debug, Default)]
pub struct RecordingSink {
    snapshots: Mutex<Vec<Snapshot>>,
    updated: Notify,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    /// Most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<Snapshot> {
        self.snapshots.lock().last().cloned()
    }

    /// Number of snapshots received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Check if nothing was published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }

    /// Wait for a snapshot matching `predicate`, checking the latest one
    /// first. Returns `None` on timeout.
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<Snapshot>
    where
        F: Fn(&Snapshot) -> bool,
    {
        let wait = async {
            loop {
                let updated = self.updated.notified();
                if let Some(snapshot) = self.last().filter(|s| predicate(s)) {
                    return snapshot;
                }
                updated.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}

impl PresentationSink for RecordingSink {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots.lock().push(snapshot.clone());
        self.updated.notify_waiters();
    }
}
