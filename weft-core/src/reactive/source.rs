//! StreamSource
//!
//! The root, writable stream. A source owns exactly one value and a list of
//! handlers. Every write replaces the value and notifies every handler, in
//! the order they subscribed, before `write` returns.
//!
//! Writes are change signals, not value updates: writing a value equal to the
//! current one still notifies. Consumers that want deduplication add it.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;

use super::stream::{Stream, Subscription};
use super::subscriber::{Handler, Subscribers};

struct SourceInner<T> {
    value: RwLock<T>,
    subscribers: Subscribers<T>,
}

/// A root stream holding a value of type `T`.
///
/// Clones share state: a write through one clone is seen by subscribers of
/// every clone.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::{Stream, StreamSource};
///
/// let count = StreamSource::new(0);
/// let sub = count.subscribe(|v| println!("count = {v}"));
/// count.write(5);
/// sub.unsubscribe();
/// ```
pub struct StreamSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SourceInner<T>>,
}

impl<T> StreamSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a source holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                value: RwLock::new(value),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Replace the value and notify every subscriber.
    pub fn write(&self, value: T) {
        let snapshot = {
            let mut guard = self.inner.value.write();
            *guard = value;
            guard.clone()
        };
        self.inner.subscribers.notify_all(&snapshot);
    }

    /// Write a value computed from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&*self.inner.value.read());
        self.write(next);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Stream for StreamSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn current(&self) -> T {
        self.inner.value.read().clone()
    }

    fn subscribe_boxed(&self, handler: Handler<T>) -> Subscription {
        let (subscriber, count) = self.inner.subscribers.insert(handler);
        let id = subscriber.id();
        tracing::trace!(subscriber = %id, count, "source subscription added");

        subscriber.notify(&self.current());

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Some(count) = inner.subscribers.remove(id) {
                    tracing::trace!(subscriber = %id, count, "source subscription removed");
                }
            }
        })
    }
}

impl<T> Clone for StreamSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for StreamSource<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("value", &self.current())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
