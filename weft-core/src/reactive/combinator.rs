//! StreamCombinator
//!
//! A derived stream computed from two upstream streams.
//!
//! # How Combinators Work
//!
//! 1. A combinator owns no value. `current()` reads both parents and applies
//!    the combine function every time it is called.
//!
//! 2. While nobody listens, the combinator holds no upstream subscription.
//!    The first local subscriber attaches it to both parents; the last one to
//!    leave detaches it again.
//!
//! 3. When either parent notifies, the combinator recomputes from the live
//!    values of both parents (never from the notification payload) and
//!    republishes to its own subscribers.
//!
//! Combinators nest: a combinator is a valid parent of another one, which is
//! how n-ary combination is expressed.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::stream::{SharedStream, Stream, Subscription};
use super::subscriber::{Handler, Subscribers};

type CombineFn<A, B, R> = dyn Fn(&A, &B) -> R + Send + Sync;

struct CombinatorInner<A, B, R> {
    first: SharedStream<A>,
    second: SharedStream<B>,
    combine: Box<CombineFn<A, B, R>>,
    subscribers: Subscribers<R>,
    /// Live upstream subscriptions, present only while attached.
    upstream: Mutex<Option<[Subscription; 2]>>,
    /// Set while attaching so the parents' replays are not republished.
    attaching: AtomicBool,
}

impl<A, B, R> CombinatorInner<A, B, R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn compute(&self) -> R {
        (self.combine)(&self.first.current(), &self.second.current())
    }

    fn republish(&self) {
        if self.attaching.load(Ordering::Acquire) {
            return;
        }
        let value = self.compute();
        self.subscribers.notify_all(&value);
    }

    fn attach(self: &Arc<Self>) {
        self.attaching.store(true, Ordering::Release);

        let weak = Arc::downgrade(self);
        let first = self.first.subscribe_boxed(upstream_handler(weak.clone()));
        let second = self.second.subscribe_boxed(upstream_handler(weak));

        self.attaching.store(false, Ordering::Release);

        let stale = self.upstream.lock().replace([first, second]);
        if let Some(stale) = stale {
            stale.iter().for_each(Subscription::unsubscribe);
        }
        tracing::debug!("combinator attached to upstream");
    }

    fn detach(&self) {
        let upstream = self.upstream.lock().take();
        if let Some(upstream) = upstream {
            upstream.iter().for_each(Subscription::unsubscribe);
            tracing::debug!("combinator detached from upstream");
        }
    }
}

fn upstream_handler<A, B, R, V>(inner: Weak<CombinatorInner<A, B, R>>) -> Handler<V>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    V: 'static,
{
    Box::new(move |_: &V| {
        if let Some(inner) = inner.upgrade() {
            inner.republish();
        }
    })
}

/// A read-only stream derived from two parents.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::{Stream, StreamCombinator, StreamSource};
///
/// let width = StreamSource::new(2);
/// let height = StreamSource::new(3);
/// let area = StreamCombinator::new(width.clone(), height, |w, h| w * h);
///
/// assert_eq!(area.current(), 6);
/// width.write(4);
/// assert_eq!(area.current(), 12);
/// ```
pub struct StreamCombinator<A, B, R> {
    inner: Arc<CombinatorInner<A, B, R>>,
}

impl<A, B, R> StreamCombinator<A, B, R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Create a combinator over `first` and `second`.
    ///
    /// Nothing is subscribed until the combinator gets its own subscriber.
    pub fn new<SA, SB, F>(first: SA, second: SB, combine: F) -> Self
    where
        SA: Stream<Value = A> + 'static,
        SB: Stream<Value = B> + 'static,
        F: Fn(&A, &B) -> R + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CombinatorInner {
                first: Arc::new(first),
                second: Arc::new(second),
                combine: Box::new(combine),
                subscribers: Subscribers::new(),
                upstream: Mutex::new(None),
                attaching: AtomicBool::new(false),
            }),
        }
    }

    /// Whether the combinator currently holds its upstream subscriptions.
    pub fn is_attached(&self) -> bool {
        self.inner.upstream.lock().is_some()
    }

    /// Number of local subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<A, B, R> Stream for StreamCombinator<A, B, R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    type Value = R;

    fn current(&self) -> R {
        self.inner.compute()
    }

    fn subscribe_boxed(&self, handler: Handler<R>) -> Subscription {
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

impl<A, B, R> Clone for StreamCombinator<A, B, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, B, R> Debug for StreamCombinator<A, B, R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCombinator")
            .field("value", &self.current())
            .field("attached", &self.is_attached())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Combine two streams. Shorthand for [`StreamCombinator::new`].
pub fn combine<SA, SB, R, F>(first: SA, second: SB, f: F) -> StreamCombinator<SA::Value, SB::Value, R>
where
    SA: Stream + 'static,
    SB: Stream + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(&SA::Value, &SB::Value) -> R + Send + Sync + 'static,
{
    StreamCombinator::new(first, second, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::StreamSource;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn current_recomputes_from_parents() {
        let a = StreamSource::new(1);
        let b = StreamSource::new(10);
        let sum = combine(a.clone(), b.clone(), |a, b| a + b);

        assert_eq!(sum.current(), 11);
        a.write(2);
        b.write(20);
        assert_eq!(sum.current(), 22);
    }

    #[test]
    fn attaches_lazily_and_detaches_on_last_unsubscribe() {
        let a = StreamSource::new(1);
        let b = StreamSource::new(2);
        let sum = combine(a.clone(), b.clone(), |a, b| a + b);

        assert!(!sum.is_attached());
        assert_eq!(a.subscriber_count(), 0);

        let s1 = sum.subscribe(|_| {});
        let s2 = sum.subscribe(|_| {});
        assert!(sum.is_attached());
        assert_eq!((a.subscriber_count(), b.subscriber_count()), (1, 1));

        s1.unsubscribe();
        assert!(sum.is_attached());
        s2.unsubscribe();
        assert!(!sum.is_attached());
        assert_eq!((a.subscriber_count(), b.subscriber_count()), (0, 0));
    }

    #[test]
    fn repeated_cycles_never_leak() {
        let a = StreamSource::new(0);
        let b = StreamSource::new(0);
        let sum = combine(a.clone(), b.clone(), |a, b| a + b);

        for _ in 0..10 {
            let sub = sum.subscribe(|_| {});
            assert_eq!((a.subscriber_count(), b.subscriber_count()), (1, 1));
            sub.unsubscribe();
            sub.unsubscribe();
            assert_eq!((a.subscriber_count(), b.subscriber_count()), (0, 0));
        }
    }

    #[test]
    fn subscriber_gets_exactly_one_replay() {
        let a = StreamSource::new(3);
        let b = StreamSource::new(4);
        let product = combine(a, b, |a, b| a * b);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = product.subscribe(move |v| seen_clone.lock().push(*v));
        assert_eq!(*seen.lock(), vec![12]);
    }

    #[test]
    fn republishes_on_either_parent() {
        let a = StreamSource::new(1);
        let b = StreamSource::new(1);
        let sum = combine(a.clone(), b.clone(), |a, b| a + b);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = sum.subscribe(move |v| seen_clone.lock().push(*v));
        a.write(5);
        b.write(5);
        b.write(5);

        assert_eq!(*seen.lock(), vec![2, 6, 10, 10]);
    }

    #[test]
    fn nested_combinators_compose() {
        let a = StreamSource::new(1);
        let b = StreamSource::new(2);
        let c = StreamSource::new(3);
        let ab = combine(a.clone(), b.clone(), |a, b| a + b);
        let abc = combine(ab.clone(), c.clone(), |ab, c| ab * c);
        let calls = Arc::new(AtomicI32::new(0));
        let last = Arc::new(AtomicI32::new(0));

        let (calls_clone, last_clone) = (calls.clone(), last.clone());
        let sub = abc.subscribe(move |v| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            last_clone.store(*v, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 9);
        assert!(ab.is_attached());

        a.write(4);
        assert_eq!(last.load(Ordering::SeqCst), 18);
        c.write(1);
        assert_eq!(last.load(Ordering::SeqCst), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        sub.unsubscribe();
        assert!(!ab.is_attached());
        assert_eq!(
            (a.subscriber_count(), b.subscriber_count(), c.subscriber_count()),
            (0, 0, 0)
        );
    }

    #[test]
    fn shared_parent_recomputes_from_live_values() {
        let a = StreamSource::new(1);
        let twice = combine(a.clone(), a.clone(), |x, y| x + y);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = twice.subscribe(move |v| seen_clone.lock().push(*v));
        a.write(3);

        // one notification per upstream subscription, both from live values
        assert_eq!(*seen.lock(), vec![2, 6, 6]);
    }
}
