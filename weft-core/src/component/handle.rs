//! Shared per-instance state.
//!
//! A [`ComponentHandle`] is the part of a component that stream handlers and
//! timers may hold on to: its lifecycle state, the pending-redraw flag and
//! the list of subscriptions to release on unmount. Handlers never see the
//! component itself.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::engine::{ComponentId, RedrawSink};
use crate::reactive::{Stream, Subscription};

/// Where a component instance is in its life.
///
/// `Destroyed` is terminal: a destroyed instance is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created by the engine, not yet attached to the document.
    Created,
    /// Attached to a document node.
    Mounted,
    /// Unmounted. Every subscription has been released.
    Destroyed,
}

pub(crate) type SubscriptionList = SmallVec<[Subscription; 4]>;

struct HandleState {
    lifecycle: LifecycleState,
    pending_redraw: bool,
    subscriptions: SubscriptionList,
}

struct HandleInner {
    id: ComponentId,
    sink: Arc<dyn RedrawSink>,
    state: Mutex<HandleState>,
}

/// Cloneable handle to a component's shared state.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Arc<HandleInner>,
}

impl ComponentHandle {
    /// A fresh handle starts `Created` with a redraw pending, so the first
    /// render pass always renders it.
    pub fn new(id: ComponentId, sink: Arc<dyn RedrawSink>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                sink,
                state: Mutex::new(HandleState {
                    lifecycle: LifecycleState::Created,
                    pending_redraw: true,
                    subscriptions: SmallVec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    /// Not yet destroyed.
    pub fn is_alive(&self) -> bool {
        self.state() != LifecycleState::Destroyed
    }

    /// Attached to a document node and not yet destroyed.
    pub fn is_mounted(&self) -> bool {
        self.state() == LifecycleState::Mounted
    }

    /// Whether a redraw was requested and has not been rendered yet.
    pub fn is_redraw_pending(&self) -> bool {
        self.inner.state.lock().pending_redraw
    }

    /// Ask the engine to render this component again.
    ///
    /// Requests coalesce: while a redraw is pending, further requests do
    /// nothing. Requests on a destroyed component are ignored.
    pub fn request_redraw(&self) {
        let notify = {
            let mut state = self.inner.state.lock();
            match state.lifecycle {
                LifecycleState::Destroyed => {
                    tracing::trace!(component = %self.inner.id, "redraw on destroyed component ignored");
                    false
                }
                _ if state.pending_redraw => false,
                _ => {
                    state.pending_redraw = true;
                    true
                }
            }
        };

        if notify {
            tracing::debug!(component = %self.inner.id, "redraw requested");
            self.inner.sink.request_redraw(self.inner.id);
        }
    }

    /// Hand a subscription to the lifecycle engine, which releases it on
    /// unmount. A subscription tracked after unmount is released at once.
    pub fn track(&self, subscription: Subscription) {
        let mut state = self.inner.state.lock();
        if state.lifecycle == LifecycleState::Destroyed {
            drop(state);
            tracing::trace!(component = %self.inner.id, "subscription after unmount released");
            subscription.unsubscribe();
            return;
        }
        state.subscriptions.push(subscription);
    }

    /// Subscribe to `stream` for the lifetime of this component.
    ///
    /// The handler stops running once the component is destroyed.
    pub fn subscribe<S, F>(&self, stream: &S, handler: F)
    where
        S: Stream + ?Sized,
        F: Fn(&S::Value) + Send + Sync + 'static,
    {
        let weak = self.downgrade();
        let subscription = stream.subscribe_boxed(Box::new(move |value: &S::Value| {
            if weak.upgrade().is_some_and(|handle| handle.is_alive()) {
                handler(value);
            }
        }));
        self.track(subscription);
    }

    /// Number of subscriptions waiting to be released.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Non-owning handle for deferred work.
    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Mark a redraw as pending without notifying the engine, which is
    /// already visiting this component.
    pub(crate) fn mark_pending(&self) {
        let mut state = self.inner.state.lock();
        if state.lifecycle != LifecycleState::Destroyed {
            state.pending_redraw = true;
        }
    }

    /// Clear the pending flag, returning its previous value.
    pub(crate) fn take_pending(&self) -> bool {
        std::mem::replace(&mut self.inner.state.lock().pending_redraw, false)
    }

    /// Move from `Created` to `Mounted`. Returns false in any other state.
    pub(crate) fn enter_mounted(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.lifecycle != LifecycleState::Created {
            return false;
        }
        state.lifecycle = LifecycleState::Mounted;
        true
    }

    /// Enter `Destroyed` and hand back the subscriptions to release, in the
    /// order they were created. Returns `None` if already destroyed.
    pub(crate) fn destroy(&self) -> Option<SubscriptionList> {
        let mut state = self.inner.state.lock();
        if state.lifecycle == LifecycleState::Destroyed {
            return None;
        }
        state.lifecycle = LifecycleState::Destroyed;
        state.pending_redraw = false;
        Some(std::mem::take(&mut state.subscriptions))
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ComponentHandle")
            .field("id", &self.inner.id)
            .field("lifecycle", &state.lifecycle)
            .field("pending_redraw", &state.pending_redraw)
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

/// Non-owning [`ComponentHandle`], for deferred work that must not keep a
/// component alive.
#[derive(Clone)]
pub struct WeakHandle {
    inner: Weak<HandleInner>,
}

impl WeakHandle {
    /// Get the handle back, unless the component's state was dropped.
    pub fn upgrade(&self) -> Option<ComponentHandle> {
        self.inner.upgrade().map(|inner| ComponentHandle { inner })
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle").finish_non_exhaustive()
    }
}
