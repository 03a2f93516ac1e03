//! Error types.
//!
//! Only failures that a caller can act on are errors. Protocol misuse inside
//! the reactive core (unsubscribing twice, asking a destroyed component to
//! redraw) is absorbed where it happens and never shows up here.

use std::fmt;

use thiserror::Error;

use crate::engine::ComponentId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    #[error("props for component {id} must be of type {expected}")]
    PropsMismatch {
        id: ComponentId,
        expected: &'static str,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no tokio runtime is available on this thread")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A failure raised by a component's render function.
///
/// The engine never inspects it. It travels back to whoever called
/// `render_if_needed`.
#[derive(Debug)]
pub struct RenderError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RenderError {
    /// A render failure with no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message, without the "render failed" prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}", self.message)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
