//! Correlation Table
//!
//! Maps in-flight request IDs to the single-use callback that receives the
//! response. IDs come from a strictly monotonic counter, so two requests in
//! the same session never share an ID.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::StreamError;
use super::messages::{RequestKind, StreamResult};

/// Callback invoked exactly once with the outcome of a request.
pub type ResultCallback = Box<dyn FnOnce(Result<StreamResult, StreamError>) + Send + 'static>;

/// A registered request awaiting its response.
pub struct PendingRequest {
    kind: RequestKind,
    registered_at: Instant,
    callback: ResultCallback,
}

impl PendingRequest {
    /// Snapshot kind the request asked for.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Time since registration.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.registered_at.elapsed()
    }

    /// Consume the entry, delivering the outcome to its callback.
    pub fn complete(self, outcome: Result<StreamResult, StreamError>) {
        (self.callback)(outcome);
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("kind", &self.kind)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

/// Concurrent map from correlation ID to pending request.
#[derive(Debug)]
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    /// Create an empty table whose first ID is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh correlation ID.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a callback under `id`.
    pub fn register(&self, id: u64, kind: RequestKind, callback: ResultCallback) {
        let entry = PendingRequest {
            kind,
            registered_at: Instant::now(),
            callback,
        };
        self.pending.lock().insert(id, entry);
    }

    /// Look up and remove the entry for `id`.
    pub fn take(&self, id: u64) -> Option<PendingRequest> {
        self.pending.lock().remove(&id)
    }

    /// Remove and return every entry registered longer than `timeout` ago.
    pub fn take_expired(&self, timeout: Duration) -> Vec<(u64, PendingRequest)> {
        let mut pending = self.pending.lock();
        let expired: Vec<u64> = pending
            .iter()
            .filter(|(_, entry)| entry.age() >= timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut taken: Vec<(u64, PendingRequest)> = expired
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|entry| (id, entry)))
            .collect();
        taken.sort_unstable_by_key(|(id, _)| *id);
        taken
    }

    /// Drop every pending entry without invoking callbacks.
    ///
    /// Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether no request is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ResultCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let table = CorrelationTable::new();
        let first = table.next_id();
        let second = table.next_id();
        let third = table.next_id();
        assert_eq!(first, 1);
        assert!(first < second && second < third);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let table = Arc::new(CorrelationTable::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || (0..1000).map(|_| table.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4000);
    }

    #[test]
    fn take_removes_entry_once() {
        let table = CorrelationTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = table.next_id();
        table.register(id, RequestKind::Balance, counting_callback(&counter));
        assert_eq!(table.len(), 1);

        let entry = table.take(id).expect("entry registered");
        assert_eq!(entry.kind(), RequestKind::Balance);
        assert!(table.take(id).is_none());
        assert!(table.is_empty());

        entry.complete(Err(StreamError::ConnectionClosed));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn take_expired_only_returns_old_entries() {
        let table = CorrelationTable::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let old = table.next_id();
        table.register(old, RequestKind::Position, counting_callback(&counter));
        std::thread::sleep(Duration::from_millis(30));
        let fresh = table.next_id();
        table.register(fresh, RequestKind::Account, counting_callback(&counter));

        let expired = table.take_expired(Duration::from_millis(20));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, old);
        assert_eq!(table.len(), 1);
        assert!(table.take(fresh).is_some());
    }

    #[test]
    fn clear_drops_without_invoking() {
        let table = CorrelationTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let id = table.next_id();
            table.register(id, RequestKind::Balance, counting_callback(&counter));
        }

        assert_eq!(table.clear(), 3);
        assert!(table.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
