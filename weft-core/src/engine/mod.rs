//! Reference Engine
//!
//! The engine side of the contract: component identities, the redraw sink
//! components report to, and a [`RenderTree`] that owns instances and runs
//! render passes over them.
//!
//! The core never depends on [`RenderTree`]. Anything that implements
//! [`RedrawSink`] and calls the lifecycle operations of
//! [`Component`](crate::component::Component) in order can drive components.

mod node;
mod redraw;
mod tree;

pub use node::{ComponentId, DomRef};
pub use redraw::{RedrawQueue, RedrawSink};
pub use tree::{RenderPass, RenderTree};
