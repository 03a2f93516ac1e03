//! What a component sees of the engine.

use std::fmt;
use std::sync::Arc;

use super::handle::ComponentHandle;
use crate::config::Config;
use crate::engine::ComponentId;
use crate::reactive::Stream;
use crate::timer::{Clock, DebouncingTimer};

/// Per-component context: its handle, the host clock and the engine config.
///
/// Passed to every [`Renderable`](super::Renderable) hook. Cloning is cheap.
#[derive(Clone)]
pub struct Scope {
    handle: ComponentHandle,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl Scope {
    /// Bundle a component's handle with the engine's clock and config.
    pub fn new(handle: ComponentHandle, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            handle,
            clock,
            config,
        }
    }

    /// Identity of the component this scope belongs to.
    pub fn id(&self) -> ComponentId {
        self.handle.id()
    }

    /// The component's shared handle, safe to move into stream handlers.
    pub fn handle(&self) -> &ComponentHandle {
        &self.handle
    }

    /// Host clock for deferred work.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shorthand for [`ComponentHandle::request_redraw`].
    pub fn request_redraw(&self) {
        self.handle.request_redraw();
    }

    /// Subscribe for the lifetime of the component.
    pub fn subscribe<S, F>(&self, stream: &S, handler: F)
    where
        S: Stream + ?Sized,
        F: Fn(&S::Value) + Send + Sync + 'static,
    {
        self.handle.subscribe(stream, handler);
    }

    /// A debouncer using the configured delays.
    pub fn debouncer(&self) -> DebouncingTimer {
        DebouncingTimer::from_config(Arc::clone(&self.clock), &self.config.debounce)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
