//! Identifiers handed out by the engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a component instance within the render tree.
///
/// The engine assigns it; the core only uses it to name the component when
/// asking for a redraw and to point at a parent without owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Generate a new unique component ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for ComponentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Opaque reference to the document node the engine created for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomRef(u64);

impl DomRef {
    /// Wrap an engine-side node id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw node id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}
