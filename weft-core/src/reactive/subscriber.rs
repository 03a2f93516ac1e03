//! Subscriber bookkeeping shared by every stream.
//!
//! A stream keeps its handlers in a [`Subscribers`] registry, keyed by
//! [`SubscriberId`] and kept in insertion order. Notification walks a snapshot
//! of the registry with no lock held, so handlers are free to write, subscribe
//! or unsubscribe while being notified.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Boxed handler accepted by [`Stream::subscribe_boxed`](super::Stream::subscribe_boxed).
pub type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A registered handler.
///
/// `active` is cleared when the handler is removed, so a notification pass
/// that already took its snapshot skips it.
pub(crate) struct Subscriber<T> {
    id: SubscriberId,
    active: AtomicBool,
    notify: Handler<T>,
}

impl<T> Subscriber<T> {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn notify(&self, value: &T) {
        if self.active.load(Ordering::Acquire) {
            (self.notify)(value);
        }
    }
}

/// Ordered registry of handlers.
pub(crate) struct Subscribers<T> {
    entries: Mutex<IndexMap<SubscriberId, Arc<Subscriber<T>>>>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a handler. Returns the entry and the registry size afterwards.
    pub(crate) fn insert(&self, notify: Handler<T>) -> (Arc<Subscriber<T>>, usize) {
        let subscriber = Arc::new(Subscriber {
            id: SubscriberId::new(),
            active: AtomicBool::new(true),
            notify,
        });
        let mut entries = self.entries.lock();
        entries.insert(subscriber.id, Arc::clone(&subscriber));
        (subscriber, entries.len())
    }

    /// Remove a handler. Returns the registry size afterwards, or `None` if
    /// the handler was not registered.
    pub(crate) fn remove(&self, id: SubscriberId) -> Option<usize> {
        let mut entries = self.entries.lock();
        let removed = entries.shift_remove(&id)?;
        removed.active.store(false, Ordering::Release);
        Some(entries.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Deliver `value` to every handler registered when the pass started,
    /// in subscription order, skipping those removed mid-pass.
    pub(crate) fn notify_all(&self, value: &T) {
        let snapshot: Vec<Arc<Subscriber<T>>> = self.entries.lock().values().cloned().collect();
        for subscriber in snapshot {
            subscriber.notify(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notify_all_follows_insertion_order() {
        let registry = Subscribers::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            registry.insert(Box::new(move |v: &i32| seen.lock().push(format!("{tag}{v}"))));
        }

        registry.notify_all(&1);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn removal_keeps_order_and_reports_size() {
        let registry = Subscribers::<i32>::new();
        let (first, _) = registry.insert(Box::new(|_: &i32| {}));
        let (_, len) = registry.insert(Box::new(|_: &i32| {}));
        assert_eq!(len, 2);

        assert_eq!(registry.remove(first.id()), Some(1));
        assert_eq!(registry.remove(first.id()), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handler_removed_mid_pass_is_skipped() {
        let registry = Arc::new(Subscribers::<i32>::new());
        let second_calls = Arc::new(AtomicI32::new(0));
        let victim = Arc::new(Mutex::new(None));

        let remover = Arc::clone(&registry);
        let slot = Arc::clone(&victim);
        registry.insert(Box::new(move |_: &i32| {
            if let Some(id) = slot.lock().take() {
                remover.remove(id);
            }
        }));
        let calls = Arc::clone(&second_calls);
        let (second, _) = registry.insert(Box::new(move |_: &i32| {
            calls.fetch_add(1, Ordering::SeqCst);
        }));
        *victim.lock() = Some(second.id());

        registry.notify_all(&0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }
}
