//! The one call the core makes into the engine.

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::node::ComponentId;

/// Receives redraw requests from components.
///
/// A component calls this at most once between two renders; coalescing
/// happens on the component side.
pub trait RedrawSink: Send + Sync {
    fn request_redraw(&self, id: ComponentId);
}

/// A [`RedrawSink`] that queues ids in request order, without duplicates.
#[derive(Debug, Default)]
pub struct RedrawQueue {
    pending: Mutex<IndexSet<ComponentId>>,
}

impl RedrawQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued id, oldest first.
    pub fn drain(&self) -> Vec<ComponentId> {
        self.pending.lock().drain(..).collect()
    }

    /// Queued ids, oldest first, leaving the queue untouched.
    pub fn snapshot(&self) -> Vec<ComponentId> {
        self.pending.lock().iter().copied().collect()
    }

    /// Forget a component, e.g. because it was unmounted.
    pub fn discard(&self, id: ComponentId) {
        self.pending.lock().shift_remove(&id);
    }

    /// Number of queued ids.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl RedrawSink for RedrawQueue {
    fn request_redraw(&self, id: ComponentId) {
        self.pending.lock().insert(id);
    }
}
