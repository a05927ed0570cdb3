//! Snapshot Store
//!
//! Single point of truth for the published heatmap. Readers always see
//! a complete, immutable snapshot behind an `Arc`; the reconcile loop
//! swaps the whole thing atomically. A watch channel notifies consumers
//! of each replacement without them polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::domain::snapshot::HeatmapSnapshot;

/// Shared holder for the current heatmap snapshot plus engine status
/// flags (loading, stale feed, last error).
pub struct SnapshotStore {
    current: RwLock<Arc<HeatmapSnapshot>>,
    loading: AtomicBool,
    stale: AtomicBool,
    error: RwLock<Option<String>>,
    tx: watch::Sender<Arc<HeatmapSnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding the empty snapshot, flagged as loading.
    #[must_use]
    pub fn new() -> Self {
        let initial = Arc::new(HeatmapSnapshot::empty());
        let (tx, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: RwLock::new(initial),
            loading: AtomicBool::new(true),
            stale: AtomicBool::new(false),
            error: RwLock::new(None),
            tx,
        }
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    #[must_use]
    pub fn current(&self) -> Arc<HeatmapSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the published snapshot and notify subscribers.
    pub fn replace(&self, snapshot: HeatmapSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Arc::clone(&snapshot);
        // send() only fails with no receivers, which is fine.
        let _ = self.tx.send(snapshot);
    }

    /// Derive and publish a new snapshot from the current one.
    ///
    /// The write lock is held across the read-modify-write, so two
    /// writers can never both derive from the same base and silently
    /// drop one another's changes.
    pub fn update(&self, f: impl FnOnce(&HeatmapSnapshot) -> HeatmapSnapshot) {
        let mut guard = self.current.write();
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        drop(guard);
        let _ = self.tx.send(next);
    }

    /// Subscribe to snapshot replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<HeatmapSnapshot>> {
        self.tx.subscribe()
    }

    /// Whether the initial load is still in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Mark the initial load finished or restarted.
    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    /// Whether the feed is currently considered stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Flag the feed stale or fresh.
    pub fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::Release);
    }

    /// The last terminal error, if the engine failed to start.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Record or clear the terminal error.
    pub fn set_error(&self, error: Option<String>) {
        *self.error.write() = error;
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::market::SecurityMetadata;

    fn sample_snapshot() -> HeatmapSnapshot {
        let universe = vec![SecurityMetadata {
            symbol: "AAPL".into(),
            name: "Apple Inc".into(),
            sector: "technology".into(),
            exchange: "NASDAQ".into(),
            market_cap: Some(Decimal::from(3_000_000_000_000u64)),
        }];
        HeatmapSnapshot::skeleton(&universe, Utc::now())
    }

    #[test]
    fn starts_loading_with_empty_snapshot() {
        let store = SnapshotStore::new();
        assert!(store.is_loading());
        assert!(store.current().is_empty());
        assert!(store.error().is_none());
        assert!(!store.is_stale());
    }

    #[test]
    fn replace_swaps_the_published_arc() {
        let store = SnapshotStore::new();
        let before = store.current();
        store.replace(sample_snapshot());
        let after = store.current();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.total_stocks, 1);
        // The old Arc is still a valid, complete snapshot.
        assert!(before.is_empty());
    }

    #[test]
    fn update_derives_from_the_latest_snapshot() {
        let store = SnapshotStore::new();
        store.replace(sample_snapshot());
        store.update(|current| {
            let mut next = current.clone();
            next.total_stocks += 1;
            next
        });
        assert_eq!(store.current().total_stocks, 2);
    }

    #[test]
    fn concurrent_updates_are_never_lost() {
        let store = Arc::new(SnapshotStore::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..25 {
                        store.update(|current| {
                            let mut next = current.clone();
                            next.total_stocks += 1;
                            next
                        });
                    }
                });
            }
        });

        assert_eq!(store.current().total_stocks, 200);
    }

    #[tokio::test]
    async fn subscribers_observe_replacements() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();
        store.replace(sample_snapshot());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().total_stocks, 1);
    }

    #[test]
    fn error_state_round_trips() {
        let store = SnapshotStore::new();
        store.set_error(Some("universe fetch failed".into()));
        assert_eq!(store.error().as_deref(), Some("universe fetch failed"));
        store.set_error(None);
        assert!(store.error().is_none());
    }
}
