//! Components
//!
//! A component is a stateful unit of UI: props in, render output out, with
//! lifecycle hooks in between. This module holds the machinery every
//! component rides on:
//!
//! - [`Renderable`]: the capability a concrete component type implements.
//! - [`Component`]: one live instance, driven by the engine through `mount`,
//!   `prepare_update`, `render_if_needed`, `update` and `unmount`.
//! - [`ComponentHandle`]: the shareable part of an instance (liveness,
//!   redraw flag, subscriptions) that stream handlers hold.
//! - [`Scope`]: what hooks get to see: handle, host clock, config.
//! - Properties: [`ObservableProperty`], [`StreamProperty`] and
//!   [`SourceProperty`], which turn state changes into redraw requests.

mod handle;
mod lifecycle;
mod properties;
mod scope;

pub use handle::{ComponentHandle, LifecycleState, WeakHandle};
pub use lifecycle::{Component, Renderable};
pub use properties::{ObservableProperty, SourceProperty, StreamProperty};
pub use scope::Scope;
