//! Derived-state helpers.
//!
//! Three kinds of component-local state, each wired to the component's
//! redraw flag:
//!
//! - [`ObservableProperty`]: a plain read-write value. Writing it requests a
//!   redraw.
//! - [`StreamProperty`]: a read-only view of a stream. Changes request a
//!   redraw; the first one is deferred by a tick so callbacks never run while
//!   the component is still being built.
//! - [`SourceProperty`]: a read-write value backed by a private
//!   [`StreamSource`], optionally routed through a configuration step such as
//!   debouncing before it reaches its handler.
//!
//! Properties hold the component's handle, never the component, so they can
//! be cloned into stream handlers and timers freely.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::handle::ComponentHandle;
use super::scope::Scope;
use crate::reactive::{Debounced, SharedStream, Stream, StreamExt, StreamSource};

type ChangeFn<T> = dyn Fn(&T, &T) + Send + Sync;

// ----------------------------------------------------------------------------
// ObservableProperty
// ----------------------------------------------------------------------------

/// A read-write value whose writes request a redraw.
///
/// ```rust,ignore
/// let open = ObservableProperty::new(scope, false)
///     .distinct()
///     .on_change(|now, before| tracing::info!(now, before, "toggled"));
/// open.set(true); // redraw + callback
/// open.set(true); // equal value, ignored
/// ```
pub struct ObservableProperty<T> {
    value: Arc<RwLock<T>>,
    handle: ComponentHandle,
    on_change: Option<Arc<ChangeFn<T>>>,
    equals: Option<fn(&T, &T) -> bool>,
}

impl<T> ObservableProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a property owned by the component behind `scope`.
    pub fn new(scope: &Scope, initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
            handle: scope.handle().clone(),
            on_change: None,
            equals: None,
        }
    }

    /// Skip writes equal to the current value.
    pub fn distinct(mut self) -> Self
    where
        T: PartialEq,
    {
        self.equals = Some(<T as PartialEq>::eq);
        self
    }

    /// Call `f(new, old)` after every accepted write.
    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the value without cloning it.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&*self.value.read())
    }

    /// Store `value`, request a redraw and run the change callback.
    ///
    /// Returns false if the write was skipped as a duplicate.
    pub fn set(&self, value: T) -> bool {
        let (current, previous) = {
            let mut guard = self.value.write();
            if let Some(equals) = self.equals {
                if equals(&*guard, &value) {
                    return false;
                }
            }
            let current = value.clone();
            (current, std::mem::replace(&mut *guard, value))
        };

        self.handle.request_redraw();
        if let Some(on_change) = &self.on_change {
            on_change(&current, &previous);
        }
        true
    }

    /// Set a value computed from the current one. See [`set`](Self::set).
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with(f);
        self.set(next)
    }
}

impl<T> Clone for ObservableProperty<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            handle: self.handle.clone(),
            on_change: self.on_change.clone(),
            equals: self.equals,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableProperty")
            .field("value", &*self.value.read())
            .field("distinct", &self.equals.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// StreamProperty
// ----------------------------------------------------------------------------

/// A read-only property that always equals a stream's current value.
pub struct StreamProperty<T> {
    stream: SharedStream<T>,
}

impl<T> StreamProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Follow `stream`, requesting a redraw on every change.
    pub fn new<S>(scope: &Scope, stream: S) -> Self
    where
        S: Stream<Value = T> + 'static,
    {
        Self::with_on_next(scope, stream, |_| {})
    }

    /// Follow `stream`, calling `on_next` and requesting a redraw on every
    /// change.
    ///
    /// The reaction to the value delivered at subscription time is deferred
    /// by one tick of the host clock. When it fires it reads the stream's
    /// value at that moment, and it is dropped if a later change was already
    /// handled, so `on_next` always ends on the value `get()` returns.
    pub fn with_on_next<S, F>(scope: &Scope, stream: S, on_next: F) -> Self
    where
        S: Stream<Value = T> + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let stream: SharedStream<T> = stream.shared();
        let on_next = Arc::new(on_next);
        let handle = scope.handle().downgrade();
        let clock = Arc::clone(scope.clock());
        let delay = scope.config().first_tick_delay();
        let first = AtomicBool::new(true);
        let superseded = Arc::new(AtomicBool::new(false));
        let weak_stream = Arc::downgrade(&stream);

        scope.subscribe(&stream, move |value: &T| {
            if first.swap(false, Ordering::AcqRel) {
                let replayed = value.clone();
                let handle = handle.clone();
                let on_next = Arc::clone(&on_next);
                let superseded = Arc::clone(&superseded);
                let stream = weak_stream.clone();
                clock.schedule(
                    delay,
                    Box::new(move || {
                        if superseded.load(Ordering::Acquire) {
                            return;
                        }
                        let Some(handle) = handle.upgrade().filter(ComponentHandle::is_alive) else {
                            return;
                        };
                        let value = stream.upgrade().map_or(replayed, |stream| stream.current());
                        on_next(&value);
                        handle.request_redraw();
                    }),
                );
                return;
            }

            superseded.store(true, Ordering::Release);
            if let Some(handle) = handle.upgrade() {
                on_next(value);
                handle.request_redraw();
            }
        });

        Self { stream }
    }

    pub fn get(&self) -> T {
        self.stream.current()
    }
}

impl<T> Clone for StreamProperty<T> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
        }
    }
}

impl<T> fmt::Debug for StreamProperty<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProperty")
            .field("value", &self.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// SourceProperty
// ----------------------------------------------------------------------------

/// A read-write property that feeds a handler through a private stream.
///
/// `get()` reflects writes immediately; the handler sees what comes out of
/// the configuration step, e.g. only settled values when debounced.
pub struct SourceProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    source: StreamSource<T>,
    handle: ComponentHandle,
}

impl<T> SourceProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Deliver every write to `handler` directly.
    pub fn new<F>(scope: &Scope, initial: T, handler: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::with_configure(scope, initial, |source, _| source.shared(), handler)
    }

    /// Deliver writes to `handler` through the scope's configured debouncer.
    pub fn debounced<F>(scope: &Scope, initial: T, handler: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::with_configure(
            scope,
            initial,
            |source, scope| Debounced::new(source, scope.debouncer()).shared(),
            handler,
        )
    }

    /// Route writes through `configure` before they reach `handler`.
    ///
    /// The handler does not receive the value replayed at subscription time,
    /// only values written after construction.
    pub fn with_configure<C, F>(scope: &Scope, initial: T, configure: C, handler: F) -> Self
    where
        C: FnOnce(StreamSource<T>, &Scope) -> SharedStream<T>,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let source = StreamSource::new(initial);
        let configured = configure(source.clone(), scope);
        let replayed = AtomicBool::new(false);

        scope.subscribe(&configured, move |value: &T| {
            if replayed.swap(true, Ordering::AcqRel) {
                handler(value);
            }
        });

        Self {
            source,
            handle: scope.handle().clone(),
        }
    }

    pub fn get(&self) -> T {
        self.source.current()
    }

    /// Store `value`, push it downstream and request a redraw.
    pub fn set(&self, value: T) {
        self.source.write(value);
        self.handle.request_redraw();
    }
}

impl<T> Clone for SourceProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<T> fmt::Debug for SourceProperty<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceProperty")
            .field("value", &self.get())
            .finish()
    }
}
