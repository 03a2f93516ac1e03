//! Debounced streams.
//!
//! [`Debounced`] forwards an upstream stream through a [`DebouncingTimer`].
//! Like a combinator it attaches to its upstream only while it has
//! subscribers. When the timer fires it reads the upstream's live value, so a
//! burst of writes collapses into one notification carrying the last value.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::stream::{SharedStream, Stream, Subscription};
use super::subscriber::{Handler, Subscribers};
use crate::timer::DebouncingTimer;

struct DebouncedInner<T> {
    upstream: SharedStream<T>,
    timer: DebouncingTimer,
    /// Last value delivered to subscribers.
    settled: RwLock<T>,
    subscribers: Subscribers<T>,
    link: Mutex<Option<Subscription>>,
    attaching: AtomicBool,
}

impl<T> DebouncedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn is_attached(&self) -> bool {
        self.link.lock().is_some()
    }

    fn on_upstream(self: &Arc<Self>) {
        if self.attaching.load(Ordering::Acquire) {
            return;
        }
        let weak = Arc::downgrade(self);
        self.timer.invoke(move || {
            if let Some(inner) = weak.upgrade() {
                inner.settle();
            }
        });
    }

    fn settle(&self) {
        if !self.is_attached() {
            return;
        }
        let value = self.upstream.current();
        *self.settled.write() = value.clone();
        self.subscribers.notify_all(&value);
    }

    fn attach(self: &Arc<Self>) {
        *self.settled.write() = self.upstream.current();

        self.attaching.store(true, Ordering::Release);
        let weak: Weak<Self> = Arc::downgrade(self);
        let link = self.upstream.subscribe_boxed(Box::new(move |_: &T| {
            if let Some(inner) = weak.upgrade() {
                inner.on_upstream();
            }
        }));
        self.attaching.store(false, Ordering::Release);

        let stale = self.link.lock().replace(link);
        if let Some(stale) = stale {
            stale.unsubscribe();
        }
    }

    fn detach(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.unsubscribe();
            self.timer.cancel();
        }
    }
}

/// A stream that settles on its upstream's value once writes stop.
///
/// `current()` is the last value delivered to subscribers while attached,
/// and the upstream's value otherwise.
pub struct Debounced<T> {
    inner: Arc<DebouncedInner<T>>,
}

impl<T> Debounced<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Debounce `upstream` through `timer`.
    ///
    /// Nothing is subscribed until the stream gets its own subscriber.
    pub fn new<S>(upstream: S, timer: DebouncingTimer) -> Self
    where
        S: Stream<Value = T> + 'static,
    {
        let settled = upstream.current();
        Self {
            inner: Arc::new(DebouncedInner {
                upstream: Arc::new(upstream),
                timer,
                settled: RwLock::new(settled),
                subscribers: Subscribers::new(),
                link: Mutex::new(None),
                attaching: AtomicBool::new(false),
            }),
        }
    }

    /// Whether a settled value is waiting on the timer.
    pub fn is_pending(&self) -> bool {
        self.inner.timer.is_pending()
    }

    /// Whether the stream currently holds its upstream subscription.
    pub fn is_attached(&self) -> bool {
        self.inner.is_attached()
    }
}

impl<T> Stream for Debounced<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn current(&self) -> T {
        if self.inner.is_attached() {
            self.inner.settled.read().clone()
        } else {
            self.inner.upstream.current()
        }
    }

    fn subscribe_boxed(&self, handler: Handler<T>) -> Subscription {
        let (subscriber, count) = self.inner.subscribers.insert(handler);
        let id = subscriber.id();
        if count == 1 {
            self.inner.attach();
        }

        subscriber.notify(&self.current());

        // The token keeps the derived stream alive while it is subscribed.
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            if inner.subscribers.remove(id) == Some(0) {
                inner.detach();
            }
        })
    }
}

impl<T> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Debounced<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("value", &self.current())
            .field("attached", &self.is_attached())
            .field("pending", &self.is_pending())
            .finish()
    }
}
