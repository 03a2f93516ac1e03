//! Component Lifecycle
//!
//! A [`Component`] wraps one [`Renderable`] instance with everything the
//! engine needs to drive it: current props, the parent it hangs under, the
//! document node it was mounted on and the last render result.
//!
//! # How It Works
//!
//! 1. The engine creates the component with its initial props. A new
//!    component has a redraw pending, so its first `render_if_needed`
//!    renders.
//!
//! 2. On every later pass the engine offers new props via
//!    `prepare_update`. If `should_update` says they differ, the props are
//!    swapped and a redraw becomes pending.
//!
//! 3. `render_if_needed` renders only when a redraw is pending. Otherwise it
//!    hands back the cached result, pointer-identical to the last one.
//!
//! 4. `unmount` releases every subscription the component made, in the order
//!    they were made, and leaves the instance inert.
//!
//! Between passes, stream handlers call `request_redraw` on the component's
//! handle. Requests coalesce, so any number of them produce one render.

use std::fmt;
use std::sync::Arc;

use super::handle::{ComponentHandle, LifecycleState};
use super::scope::Scope;
use crate::engine::{ComponentId, DomRef};
use crate::error::RenderError;

/// The capability a concrete component type provides.
///
/// Only `create` and `render` are required. The engine depends on this trait
/// and the lifecycle operations of [`Component`], never on concrete types.
pub trait Renderable: Send + 'static {
    type Props: PartialEq + Send + 'static;
    type Output: Send + Sync + 'static;

    /// Build the instance. Subscriptions made through `scope` here are
    /// released on unmount.
    fn create(props: &Self::Props, scope: &Scope) -> Self
    where
        Self: Sized;

    fn render(&mut self, props: &Self::Props, scope: &Scope) -> Result<Self::Output, RenderError>;

    /// Whether `next` warrants new props and a redraw. Defaults to `!=`.
    fn should_update(&self, current: &Self::Props, next: &Self::Props) -> bool {
        current != next
    }

    /// Called after new props were swapped in.
    fn on_next_props(&mut self, _next: &Self::Props, _previous: &Self::Props, _scope: &Scope) {}

    fn on_mount(&mut self, _scope: &Scope) {}

    /// Called after every render that actually ran, never after cache hits.
    fn on_update(&mut self, _scope: &Scope) {}

    fn on_unmount(&mut self, _scope: &Scope) {}
}

/// A live component instance.
pub struct Component<R: Renderable> {
    renderable: R,
    props: R::Props,
    parent: Option<ComponentId>,
    dom: Option<DomRef>,
    scope: Scope,
    cache: Option<Arc<R::Output>>,
    /// A render ran since the last mount/update.
    fresh_render: bool,
    render_count: u64,
}

impl<R: Renderable> Component<R> {
    /// Create the instance through [`Renderable::create`]. No render happens
    /// yet, but one is pending.
    pub fn new(props: R::Props, parent: Option<ComponentId>, scope: Scope) -> Self {
        let renderable = R::create(&props, &scope);
        Self {
            renderable,
            props,
            parent,
            dom: None,
            scope,
            cache: None,
            fresh_render: false,
            render_count: 0,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.scope.id()
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.scope.handle()
    }

    /// Context passed to every hook.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Props of the last accepted update.
    pub fn props(&self) -> &R::Props {
        &self.props
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn dom(&self) -> Option<DomRef> {
        self.dom
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.handle().state()
    }

    pub fn renderable(&self) -> &R {
        &self.renderable
    }

    pub fn renderable_mut(&mut self) -> &mut R {
        &mut self.renderable
    }

    /// Number of times `render` actually ran.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Whether a render ran since the last `mount` or `update`.
    pub fn rendered_since_update(&self) -> bool {
        self.fresh_render
    }

    /// Shorthand for [`ComponentHandle::request_redraw`].
    pub fn request_redraw(&self) {
        self.handle().request_redraw();
    }

    /// Whether `next` would replace the current props.
    pub fn should_update(&self, next: &R::Props) -> bool {
        self.renderable.should_update(&self.props, next)
    }

    /// Offer new props. Returns whether a redraw is now pending.
    pub fn prepare_update(&mut self, next: R::Props, parent: Option<ComponentId>) -> bool {
        if !self.handle().is_alive() {
            tracing::trace!(component = %self.id(), "prepare_update on destroyed component ignored");
            return false;
        }

        if self.should_update(&next) {
            self.handle().mark_pending();
            let previous = std::mem::replace(&mut self.props, next);
            self.parent = parent;
            self.renderable
                .on_next_props(&self.props, &previous, &self.scope);
        }
        self.handle().is_redraw_pending()
    }

    /// Render if a redraw is pending, otherwise return the cached result.
    ///
    /// A failed render leaves the previous result cached and the redraw
    /// pending, and returns the error.
    pub fn render_if_needed(&mut self) -> Result<Arc<R::Output>, RenderError> {
        if let Some(cached) = &self.cache {
            if !self.handle().is_redraw_pending() {
                return Ok(Arc::clone(cached));
            }
        }
        if !self.handle().is_alive() {
            return Err(RenderError::new("component was unmounted before it rendered"));
        }

        self.handle().take_pending();
        match self.renderable.render(&self.props, &self.scope) {
            Ok(output) => {
                let output = Arc::new(output);
                self.cache = Some(Arc::clone(&output));
                self.fresh_render = true;
                self.render_count += 1;
                tracing::debug!(component = %self.id(), renders = self.render_count, "rendered");
                Ok(output)
            }
            Err(err) => {
                self.handle().mark_pending();
                Err(err)
            }
        }
    }

    /// Record the document node and run `on_mount`. Only the first call on
    /// a fresh component has an effect.
    pub fn mount(&mut self, dom: DomRef) {
        if !self.handle().enter_mounted() {
            tracing::trace!(component = %self.id(), "mount outside Created state ignored");
            return;
        }
        self.dom = Some(dom);
        self.fresh_render = false;
        self.renderable.on_mount(&self.scope);
    }

    /// Record the (possibly new) document node and run `on_update`.
    pub fn update(&mut self, dom: DomRef) {
        if !self.handle().is_alive() {
            tracing::trace!(component = %self.id(), "update on destroyed component ignored");
            return;
        }
        self.dom = Some(dom);
        self.fresh_render = false;
        self.renderable.on_update(&self.scope);
    }

    /// Release every subscription, run `on_unmount` and clear the document
    /// node. Later calls do nothing.
    pub fn unmount(&mut self) {
        let Some(subscriptions) = self.handle().destroy() else {
            tracing::trace!(component = %self.id(), "unmount on destroyed component ignored");
            return;
        };

        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        tracing::debug!(
            component = %self.id(),
            subscriptions = subscriptions.len(),
            "unmounted"
        );

        self.renderable.on_unmount(&self.scope);
        self.dom = None;
        self.fresh_render = false;
    }
}

impl<R> fmt::Debug for Component<R>
where
    R: Renderable,
    R::Props: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("props", &self.props)
            .field("parent", &self.parent)
            .field("dom", &self.dom)
            .field("render_count", &self.render_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::RedrawQueue;
    use crate::reactive::{Stream, StreamSource};
    use crate::timer::ManualClock;
    use parking_lot::Mutex;

    /// Renders its label, records every hook it sees.
    struct Label {
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct LabelProps {
        text: String,
        log: LogSlot,
    }

    /// Props field that compares equal regardless of content.
    #[derive(Debug, Clone)]
    struct LogSlot(Arc<Mutex<Vec<String>>>);

    impl PartialEq for LogSlot {
        fn eq(&self, _: &Self) -> bool {
            true
        }
    }

    impl Renderable for Label {
        type Props = LabelProps;
        type Output = String;

        fn create(props: &LabelProps, _scope: &Scope) -> Self {
            props.log.0.lock().push("create".into());
            Self {
                log: Arc::clone(&props.log.0),
                fail: false,
            }
        }

        fn render(&mut self, props: &LabelProps, _scope: &Scope) -> Result<String, RenderError> {
            if self.fail {
                return Err(RenderError::new("broken template"));
            }
            self.log.lock().push(format!("render {}", props.text));
            Ok(format!("<span>{}</span>", props.text))
        }

        fn on_next_props(&mut self, next: &LabelProps, previous: &LabelProps, _scope: &Scope) {
            self.log
                .lock()
                .push(format!("next {} -> {}", previous.text, next.text));
        }

        fn on_mount(&mut self, _scope: &Scope) {
            self.log.lock().push("mount".into());
        }

        fn on_update(&mut self, _scope: &Scope) {
            self.log.lock().push("update".into());
        }

        fn on_unmount(&mut self, _scope: &Scope) {
            self.log.lock().push("unmount".into());
        }
    }

    struct Fixture {
        queue: Arc<RedrawQueue>,
        log: Arc<Mutex<Vec<String>>>,
        component: Component<Label>,
    }

    fn props(text: &str, log: &Arc<Mutex<Vec<String>>>) -> LabelProps {
        LabelProps {
            text: text.into(),
            log: LogSlot(Arc::clone(log)),
        }
    }

    fn fixture(text: &str) -> Fixture {
        let queue = Arc::new(RedrawQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = ComponentHandle::new(ComponentId::new(), queue.clone());
        let scope = Scope::new(handle, Arc::new(ManualClock::new()), Arc::new(Config::default()));
        let component = Component::new(props(text, &log), None, scope);
        Fixture {
            queue,
            log,
            component,
        }
    }

    #[test]
    fn first_render_always_runs() {
        let mut f = fixture("hi");
        assert_eq!(f.component.state(), LifecycleState::Created);

        let out = f.component.render_if_needed().unwrap();
        assert_eq!(*out, "<span>hi</span>");
        assert_eq!(f.component.render_count(), 1);
    }

    #[test]
    fn cache_hit_returns_identical_result() {
        let mut f = fixture("hi");
        let first = f.component.render_if_needed().unwrap();
        let second = f.component.render_if_needed().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.component.render_count(), 1);
    }

    #[test]
    fn many_requests_one_render() {
        let mut f = fixture("hi");
        f.component.render_if_needed().unwrap();
        f.component.mount(DomRef::new(1));

        for _ in 0..7 {
            f.component.request_redraw();
        }
        assert_eq!(f.queue.drain(), vec![f.component.id()]);

        f.component.render_if_needed().unwrap();
        f.component.render_if_needed().unwrap();
        assert_eq!(f.component.render_count(), 2);
    }

    #[test]
    fn prepare_update_with_equal_props_keeps_cache() {
        let mut f = fixture("hi");
        let first = f.component.render_if_needed().unwrap();

        let same = props("hi", &f.log);
        assert!(!f.component.prepare_update(same, None));
        let second = f.component.render_if_needed().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn prepare_update_swaps_props_and_parent() {
        let mut f = fixture("hi");
        f.component.render_if_needed().unwrap();
        let parent = ComponentId::new();

        assert!(f.component.prepare_update(props("bye", &f.log), Some(parent)));
        // idempotent until consumed
        assert!(f.component.prepare_update(props("bye", &f.log), Some(parent)));
        assert_eq!(f.component.parent(), Some(parent));
        assert_eq!(f.component.props().text, "bye");

        let out = f.component.render_if_needed().unwrap();
        assert_eq!(*out, "<span>bye</span>");
        assert!(f.queue.is_empty());
        assert_eq!(
            *f.log.lock(),
            vec!["create", "render hi", "next hi -> bye", "render bye"]
        );
    }

    #[test]
    fn update_runs_only_after_real_renders() {
        let mut f = fixture("hi");
        f.component.render_if_needed().unwrap();
        f.component.mount(DomRef::new(1));
        assert!(!f.component.rendered_since_update());

        f.component.render_if_needed().unwrap();
        assert!(!f.component.rendered_since_update());

        f.component.request_redraw();
        f.component.render_if_needed().unwrap();
        assert!(f.component.rendered_since_update());
        f.component.update(DomRef::new(2));
        assert_eq!(f.component.dom(), Some(DomRef::new(2)));
        assert!(!f.component.rendered_since_update());
    }

    #[test]
    fn render_failure_keeps_cache_and_stays_pending() {
        let mut f = fixture("hi");
        let good = f.component.render_if_needed().unwrap();

        f.component.renderable_mut().fail = true;
        f.component.request_redraw();
        let err = f.component.render_if_needed().unwrap_err();
        assert_eq!(err.message(), "broken template");
        assert!(f.component.handle().is_redraw_pending());

        f.component.renderable_mut().fail = false;
        let fixed = f.component.render_if_needed().unwrap();
        assert!(!Arc::ptr_eq(&good, &fixed));
    }

    #[test]
    fn unmount_releases_subscriptions_in_order_once() {
        let mut f = fixture("hi");
        let order = Arc::new(Mutex::new(Vec::new()));
        let source = StreamSource::new(0);

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            let sub = source.subscribe(|_| {});
            let tracked = sub.clone();
            f.component.handle().track(crate::reactive::Subscription::new(move || {
                order.lock().push(tag);
                tracked.unsubscribe();
            }));
        }
        f.component.render_if_needed().unwrap();
        f.component.mount(DomRef::new(1));

        f.component.unmount();
        f.component.unmount();

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(f.component.state(), LifecycleState::Destroyed);
        assert_eq!(f.component.dom(), None);
        assert_eq!(f.log.lock().last().map(String::as_str), Some("unmount"));
    }

    #[test]
    fn destroyed_component_is_inert() {
        let mut f = fixture("hi");
        let cached = f.component.render_if_needed().unwrap();
        f.component.mount(DomRef::new(1));
        f.component.unmount();

        f.component.request_redraw();
        assert!(f.queue.is_empty());
        assert!(!f.component.prepare_update(props("new", &f.log), None));
        f.component.update(DomRef::new(9));
        assert_eq!(f.component.dom(), None);

        let again = f.component.render_if_needed().unwrap();
        assert!(Arc::ptr_eq(&cached, &again));
        assert_eq!(f.component.render_count(), 1);
    }

    #[test]
    fn unmount_before_first_render() {
        let mut f = fixture("hi");
        f.component.unmount();
        assert!(f.component.render_if_needed().is_err());
    }

    #[test]
    fn mount_runs_hook_once() {
        let mut f = fixture("hi");
        f.component.render_if_needed().unwrap();
        f.component.mount(DomRef::new(1));
        f.component.mount(DomRef::new(2));

        assert_eq!(f.component.dom(), Some(DomRef::new(1)));
        assert_eq!(f.log.lock().iter().filter(|e| *e == "mount").count(), 1);
    }
}
