//! The `Stream` capability and its unsubscribe token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::combinator::StreamCombinator;
use super::debounced::Debounced;
use super::subscriber::Handler;
use crate::timer::{Clock, DebouncingTimer};

/// A readable, subscribable value cell.
///
/// # Contract
///
/// - `current()` always has a value and is pure: two calls with no write in
///   between return equal values.
/// - `subscribe_boxed` registers the handler, invokes it exactly once
///   synchronously with `current()`, and only then returns. Every later
///   notification arrives after that replay.
/// - The returned [`Subscription`] removes the handler. Unsubscribing twice is
///   a no-op.
pub trait Stream: Send + Sync {
    type Value: Clone + Send + Sync + 'static;

    /// Read the current value.
    fn current(&self) -> Self::Value;

    /// Register a boxed handler. Object-safe form of [`Stream::subscribe`].
    fn subscribe_boxed(&self, handler: Handler<Self::Value>) -> Subscription;

    /// Register a handler.
    fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static,
        Self: Sized,
    {
        self.subscribe_boxed(Box::new(handler))
    }
}

impl<S> Stream for Arc<S>
where
    S: Stream + ?Sized,
{
    type Value = S::Value;

    fn current(&self) -> Self::Value {
        (**self).current()
    }

    fn subscribe_boxed(&self, handler: Handler<Self::Value>) -> Subscription {
        (**self).subscribe_boxed(handler)
    }
}

/// Shared, type-erased stream.
pub type SharedStream<T> = Arc<dyn Stream<Value = T>>;

/// Combinators available on every sized stream.
pub trait StreamExt: Stream + Sized + 'static {
    /// Derive a stream from this one and `other`.
    fn combine<S, R, F>(self, other: S, combine: F) -> StreamCombinator<Self::Value, S::Value, R>
    where
        S: Stream + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(&Self::Value, &S::Value) -> R + Send + Sync + 'static,
    {
        StreamCombinator::new(self, other, combine)
    }

    /// Forward values through a fresh [`DebouncingTimer`].
    fn debounce(
        self,
        clock: Arc<dyn Clock>,
        delay: Duration,
        first_delay: Duration,
    ) -> Debounced<Self::Value> {
        Debounced::new(self, DebouncingTimer::new(clock, delay, first_delay))
    }

    /// Erase the concrete stream type.
    fn shared(self) -> SharedStream<Self::Value> {
        Arc::new(self)
    }
}

impl<S> StreamExt for S where S: Stream + Sized + 'static {}

type Cancel = Box<dyn FnOnce() + Send>;

/// Token returned by [`Stream::subscribe`].
///
/// Clones share the same registration. Dropping a subscription does not
/// unsubscribe; components hand theirs to the lifecycle engine, which calls
/// [`Subscription::unsubscribe`] on unmount.
#[derive(Clone)]
#[must_use = "a dropped Subscription stays registered; keep it to unsubscribe later"]
pub struct Subscription {
    cancel: Arc<Mutex<Option<Cancel>>>,
}

impl Subscription {
    /// Wrap the removal logic of a stream implementation.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// Remove the handler. Only the first call has an effect.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        match cancel {
            Some(cancel) => cancel(),
            None => tracing::trace!("unsubscribe on a released subscription ignored"),
        }
    }

    /// Whether the handler is still registered through this token.
    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
