//! The pairing of one transition tree and one effect tree.

mod builder;

pub use builder::{EffectBuilder, ReduceBuilder, TransitionBuilder};

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::effect::Effect;
use crate::handler::HandlerChain;
use crate::source::{Action, State};
use crate::transition::Transition;

/// Opaque identity of a built scope. Used for bookkeeping and equality
/// during tree assembly, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub(crate) fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One component's transition/effect pairing, plus the `catch` handlers
/// registered at build time. Built once and immutable afterwards.
pub struct Reduce<A, S> {
    scope_id: ScopeId,
    transition: Option<Arc<Transition<A, S>>>,
    effect: Option<Arc<Effect<A, S>>>,
    handlers: HandlerChain,
}

impl<A: Action, S: State> Reduce<A, S> {
    pub(crate) fn new(
        scope_id: ScopeId,
        transition: Option<Arc<Transition<A, S>>>,
        effect: Option<Arc<Effect<A, S>>>,
        handlers: HandlerChain,
    ) -> Self {
        Self {
            scope_id,
            transition,
            effect,
            handlers,
        }
    }

    pub fn builder() -> ReduceBuilder<A, S> {
        ReduceBuilder::new()
    }

    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    pub fn transition(&self) -> Option<&Arc<Transition<A, S>>> {
        self.transition.as_ref()
    }

    pub fn effect(&self) -> Option<&Arc<Effect<A, S>>> {
        self.effect.as_ref()
    }

    pub fn handlers(&self) -> &HandlerChain {
        &self.handlers
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<Arc<Transition<A, S>>>,
        Option<Arc<Effect<A, S>>>,
        HandlerChain,
    ) {
        (self.transition, self.effect, self.handlers)
    }
}

impl<A, S> Clone for Reduce<A, S> {
    fn clone(&self) -> Self {
        Self {
            scope_id: self.scope_id,
            transition: self.transition.clone(),
            effect: self.effect.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<A, S> PartialEq for Reduce<A, S> {
    fn eq(&self, other: &Self) -> bool {
        self.scope_id == other.scope_id
    }
}

impl<A, S> Eq for Reduce<A, S> {}

impl<A, S> fmt::Debug for Reduce<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reduce")
            .field("scope_id", &self.scope_id)
            .field("has_transition", &self.transition.is_some())
            .field("has_effect", &self.effect.is_some())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Declare a reduce through the builder DSL:
///
/// ```ignore
/// let reduce = statekit::reduce(|r| {
///     r.catch(|failure| tracing::warn!("{:#}", failure.error));
///     r.transition(|src| next_state(src));
///     r.suspend_effect(|src| async move { refresh(src).await });
/// });
/// ```
pub fn reduce<A: Action, S: State>(
    body: impl FnOnce(&mut ReduceBuilder<A, S>),
) -> Reduce<A, S> {
    let mut builder = ReduceBuilder::new();
    body(&mut builder);
    builder.build()
}
