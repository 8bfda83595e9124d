//! Failure routing for transition and effect evaluation.
//!
//! A failing leaf never aborts its siblings and never reaches the caller of
//! `dispatch`. Instead the failure is wrapped in an [`EffectFailure`] and
//! handed to every handler registered via `catch`, in registration order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Where a routed failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// A transition leaf returned an error or panicked; the commit for
    /// that dispatch was skipped.
    Transition,
    /// A synchronous effect leaf.
    Effect,
    /// A suspending effect leaf, or the task it was launched on.
    AsyncEffect,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::Transition => write!(f, "transition"),
            FailureOrigin::Effect => write!(f, "effect"),
            FailureOrigin::AsyncEffect => write!(f, "async effect"),
        }
    }
}

/// A failure captured inside tree evaluation, as seen by `catch` handlers.
#[derive(Debug)]
pub struct EffectFailure {
    pub error: anyhow::Error,
    pub origin: FailureOrigin,
}

impl EffectFailure {
    pub fn new(origin: FailureOrigin, error: anyhow::Error) -> Self {
        Self { error, origin }
    }
}

pub type HandlerFn = dyn Fn(&EffectFailure) + Send + Sync;

/// Ordered chain of failure handlers. Every handler sees every failure.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<HandlerFn>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<HandlerFn>) {
        self.handlers.push(handler);
    }

    /// Append another chain's handlers, preserving their order.
    pub fn extend(&mut self, other: &HandlerChain) {
        self.handlers.extend(other.handlers.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Invoke every handler in registration order.
    ///
    /// An empty chain means neither the reduce nor the process-wide
    /// configuration provided a handler. That is a configuration error:
    /// loud under debug assertions, a logged degraded mode in release.
    pub fn dispatch(&self, failure: &EffectFailure) {
        if self.handlers.is_empty() {
            tracing::error!(
                "unhandled {} failure and no handler registered: {:#}",
                failure.origin,
                failure.error
            );
            debug_assert!(
                false,
                "no `catch` handler registered and no process-wide default installed"
            );
            return;
        }
        for handler in &self.handlers {
            (**handler)(failure);
        }
    }
}

/// Convert a captured panic payload into an opaque error.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    anyhow::anyhow!("panicked: {message}")
}
