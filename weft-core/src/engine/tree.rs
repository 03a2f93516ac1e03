//! Render Tree
//!
//! A minimal engine that owns component instances and drives them through
//! their lifecycle. It is small on purpose: real engines diff output and
//! create document nodes, this one only keeps the bookkeeping the core needs.
//!
//! # Render Passes
//!
//! Components never render themselves. They ask for a redraw, the request
//! lands in the tree's [`RedrawQueue`], and the next [`RenderTree::render_pass`]
//! handles the queue:
//!
//! 1. Drain the queue and drop ids of components that are gone.
//! 2. Sort the rest ancestors-first (by depth, request order within a level).
//! 3. Render each one through `render_if_needed`.
//! 4. For every component that actually rendered and has a document node,
//!    call `update` with that node.
//!
//! A component whose render fails keeps its previous output and is queued
//! again for the next pass.

use std::any::{self, Any};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::node::{ComponentId, DomRef};
use super::redraw::{RedrawQueue, RedrawSink};
use crate::component::{Component, ComponentHandle, Renderable, Scope};
use crate::config::Config;
use crate::error::{Error, RenderError, Result};
use crate::timer::Clock;

/// The lifecycle surface of a component, with its concrete type erased.
trait AnyComponent<O>: Send {
    fn handle(&self) -> &ComponentHandle;
    fn parent(&self) -> Option<ComponentId>;
    fn dom(&self) -> Option<DomRef>;
    fn mount(&mut self, dom: DomRef);
    fn prepare_update(&mut self, props: Box<dyn Any + Send>, parent: Option<ComponentId>) -> Result<bool>;
    fn render_if_needed(&mut self) -> std::result::Result<Arc<O>, RenderError>;
    fn rendered_since_update(&self) -> bool;
    fn update(&mut self, dom: DomRef);
    fn unmount(&mut self);
}

impl<R: Renderable> AnyComponent<R::Output> for Component<R> {
    fn handle(&self) -> &ComponentHandle {
        Component::handle(self)
    }

    fn parent(&self) -> Option<ComponentId> {
        Component::parent(self)
    }

    fn dom(&self) -> Option<DomRef> {
        Component::dom(self)
    }

    fn mount(&mut self, dom: DomRef) {
        Component::mount(self, dom);
    }

    fn prepare_update(&mut self, props: Box<dyn Any + Send>, parent: Option<ComponentId>) -> Result<bool> {
        let props = props.downcast::<R::Props>().map_err(|_| Error::PropsMismatch {
            id: self.id(),
            expected: any::type_name::<R::Props>(),
        })?;
        Ok(Component::prepare_update(self, *props, parent))
    }

    fn render_if_needed(&mut self) -> std::result::Result<Arc<R::Output>, RenderError> {
        Component::render_if_needed(self)
    }

    fn rendered_since_update(&self) -> bool {
        Component::rendered_since_update(self)
    }

    fn update(&mut self, dom: DomRef) {
        Component::update(self, dom);
    }

    fn unmount(&mut self) {
        Component::unmount(self);
    }
}

/// What a render pass did.
pub struct RenderPass<O> {
    /// Components that rendered, in the order they rendered.
    pub rendered: Vec<(ComponentId, Arc<O>)>,
    /// Components whose render failed. They stay queued.
    pub failed: Vec<(ComponentId, RenderError)>,
}

impl<O> RenderPass<O> {
    /// Nothing rendered and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty() && self.failed.is_empty()
    }

    /// Ids of the components that rendered.
    pub fn rendered_ids(&self) -> Vec<ComponentId> {
        self.rendered.iter().map(|(id, _)| *id).collect()
    }
}

impl<O> Default for RenderPass<O> {
    fn default() -> Self {
        Self {
            rendered: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<O> fmt::Debug for RenderPass<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPass")
            .field("rendered", &self.rendered_ids())
            .field("failed", &self.failed)
            .finish()
    }
}

/// Owns the components of one document, all producing output of type `O`.
pub struct RenderTree<O> {
    nodes: HashMap<ComponentId, Box<dyn AnyComponent<O>>>,
    queue: Arc<RedrawQueue>,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl<O> RenderTree<O>
where
    O: Send + Sync + 'static,
{
    /// Create an empty tree whose components share `clock` and `config`.
    pub fn new(clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            nodes: HashMap::new(),
            queue: Arc::new(RedrawQueue::new()),
            clock,
            config,
        }
    }

    /// Configuration handed to every component's scope.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a component of type `R` under `parent`.
    ///
    /// The component starts `Created` with a redraw pending; the caller
    /// renders it and then mounts it.
    pub fn insert<R>(&mut self, props: R::Props, parent: Option<ComponentId>) -> Result<ComponentId>
    where
        R: Renderable<Output = O>,
    {
        if let Some(parent) = parent {
            self.node(parent)?;
        }

        let id = ComponentId::new();
        let sink: Arc<dyn RedrawSink> = self.queue.clone();
        let handle = ComponentHandle::new(id, sink);
        let scope = Scope::new(handle, Arc::clone(&self.clock), Arc::clone(&self.config));
        let component = Component::<R>::new(props, parent, scope);

        self.nodes.insert(id, Box::new(component));
        tracing::debug!(component = %id, parent = ?parent, "component inserted");
        Ok(id)
    }

    /// Attach a component to its document node and run `on_mount`.
    pub fn mount(&mut self, id: ComponentId, dom: DomRef) -> Result<()> {
        self.node_mut(id)?.mount(dom);
        Ok(())
    }

    /// Offer new props to a component. `P` must be the component's props
    /// type. Returns whether a redraw is now pending.
    pub fn prepare_update<P>(&mut self, id: ComponentId, props: P, parent: Option<ComponentId>) -> Result<bool>
    where
        P: Send + 'static,
    {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        self.node_mut(id)?.prepare_update(Box::new(props), parent)
    }

    /// Render a component if it has a redraw pending, otherwise return its
    /// cached output.
    pub fn render_if_needed(&mut self, id: ComponentId) -> Result<Arc<O>> {
        Ok(self.node_mut(id)?.render_if_needed()?)
    }

    /// Record a component's document node after a render and run `on_update`.
    pub fn update(&mut self, id: ComponentId, dom: DomRef) -> Result<()> {
        self.node_mut(id)?.update(dom);
        Ok(())
    }

    /// Unmount a component and everything below it, deepest first, and
    /// remove them from the tree.
    pub fn unmount(&mut self, id: ComponentId) -> Result<()> {
        self.node(id)?;

        for id in self.subtree(id).into_iter().rev() {
            if let Some(mut node) = self.nodes.remove(&id) {
                node.unmount();
            }
            self.queue.discard(id);
        }
        Ok(())
    }

    /// Shared handle of a component, for code outside the tree that wants to
    /// request redraws or subscribe on its behalf.
    pub fn handle(&self, id: ComponentId) -> Result<ComponentHandle> {
        Ok(self.node(id)?.handle().clone())
    }

    /// Parent of a component, `None` for roots.
    pub fn parent_of(&self, id: ComponentId) -> Result<Option<ComponentId>> {
        Ok(self.node(id)?.parent())
    }

    /// Document node a component is mounted on, if any.
    pub fn dom_of(&self, id: ComponentId) -> Result<Option<DomRef>> {
        Ok(self.node(id)?.dom())
    }

    /// Number of ancestors. Roots have depth 0.
    pub fn depth_of(&self, id: ComponentId) -> Result<usize> {
        self.node(id)?;
        Ok(self.depth(id))
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` names a live component in this tree.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Components waiting for the next render pass, in request order.
    pub fn pending_redraws(&self) -> Vec<ComponentId> {
        self.queue.snapshot()
    }

    /// Render every component that asked for a redraw since the last pass.
    pub fn render_pass(&mut self) -> RenderPass<O> {
        let mut requested: Vec<(usize, ComponentId)> = self
            .queue
            .drain()
            .into_iter()
            .filter(|id| self.nodes.contains_key(id))
            .map(|id| (self.depth(id), id))
            .collect();
        requested.sort_by_key(|&(depth, _)| depth);

        let mut pass = RenderPass::default();
        for (_, id) in requested {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let handle = node.handle();
            if !handle.is_alive() || !handle.is_redraw_pending() {
                continue;
            }

            match node.render_if_needed() {
                Ok(output) => {
                    if let Some(dom) = node.dom().filter(|_| node.rendered_since_update()) {
                        node.update(dom);
                    }
                    pass.rendered.push((id, output));
                }
                Err(err) => {
                    tracing::warn!(component = %id, error = %err, "render failed, retrying next pass");
                    self.queue.request_redraw(id);
                    pass.failed.push((id, err));
                }
            }
        }

        tracing::debug!(
            rendered = pass.rendered.len(),
            failed = pass.failed.len(),
            "render pass finished"
        );
        pass
    }

    fn node(&self, id: ComponentId) -> Result<&dyn AnyComponent<O>> {
        self.nodes
            .get(&id)
            .map(|node| &**node)
            .ok_or(Error::UnknownComponent(id))
    }

    fn node_mut(&mut self, id: ComponentId) -> Result<&mut Box<dyn AnyComponent<O>>> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownComponent(id))
    }

    fn depth(&self, id: ComponentId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(&id).and_then(|node| node.parent());
        // bounded by the node count so a parent cycle cannot hang the walk
        while let Some(parent) = current {
            if depth >= self.nodes.len() {
                break;
            }
            depth += 1;
            current = self.nodes.get(&parent).and_then(|node| node.parent());
        }
        depth
    }

    /// `root` and its descendants, breadth-first.
    fn subtree(&self, root: ComponentId) -> Vec<ComponentId> {
        let mut children: HashMap<ComponentId, Vec<ComponentId>> = HashMap::new();
        for (&id, node) in &self.nodes {
            if let Some(parent) = node.parent() {
                children.entry(parent).or_default().push(id);
            }
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(kids) = children.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }
        order
    }
}

impl<O> fmt::Debug for RenderTree<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTree")
            .field("components", &self.nodes.len())
            .field("pending_redraws", &self.queue.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
