//! Weft Core
//!
//! This crate provides the reactive core of the Weft component framework.
//! It implements:
//!
//! - Push/pull streams (sources, combinators, debounced streams)
//! - A debouncing timer on top of an injectable clock
//! - The component lifecycle engine (mount, update, render caching, unmount)
//! - Property helpers that turn state changes into redraw requests
//! - A small reference engine that owns components and runs render passes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Streams and subscriptions
//! - `timer`: Clocks and the debouncing timer
//! - `component`: Component instances, their lifecycle and properties
//! - `engine`: Component identities, the redraw sink and the render tree
//! - `config`: Engine configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use weft_core::reactive::{combine, Stream, StreamSource};
//!
//! // Create two sources
//! let first = StreamSource::new(String::from("Ada"));
//! let last = StreamSource::new(String::from("Lovelace"));
//!
//! // Derive a value from both
//! let full = combine(first.clone(), last, |f, l| format!("{f} {l}"));
//!
//! // Subscribe: the current value is replayed immediately
//! let sub = full.subscribe(|name| println!("name: {name}"));
//!
//! // Write to a source: the subscriber sees "Grace Lovelace"
//! first.write(String::from("Grace"));
//! sub.unsubscribe();
//! ```

pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod reactive;
pub mod timer;

pub use config::Config;
pub use error::{Error, RenderError, Result};
