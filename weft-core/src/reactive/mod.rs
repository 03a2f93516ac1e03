//! Reactive Primitives
//!
//! This module implements the stream family that carries state through the
//! engine.
//!
//! # Concepts
//!
//! ## Streams
//!
//! A [`Stream`] is a value cell that can be both read (`current()`) and
//! watched (`subscribe()`). Subscribing delivers the current value right away
//! and every later change after that.
//!
//! ## Sources
//!
//! A [`StreamSource`] is the only writable stream. Every write notifies every
//! subscriber, in subscription order, before `write` returns.
//!
//! ## Derived streams
//!
//! A [`StreamCombinator`] computes its value from two parents and
//! [`Debounced`] settles on its parent's value once writes stop. Both attach
//! to their parents only while someone listens to them.
//!
//! # Implementation Notes
//!
//! Subscriptions are explicit: there is no ambient tracking context. Whoever
//! subscribes keeps the returned [`Subscription`] and is responsible for
//! releasing it. Components hand theirs to the lifecycle engine, which
//! releases them all on unmount.

mod combinator;
mod debounced;
mod source;
mod stream;
mod subscriber;

pub use combinator::{combine, StreamCombinator};
pub use debounced::Debounced;
pub use source::StreamSource;
pub use stream::{SharedStream, Stream, StreamExt, Subscription};
pub use subscriber::{Handler, SubscriberId};
