//! Action/state context threaded through tree evaluation.

use std::sync::Arc;

use crate::container::DispatchHandle;

/// Marker trait for action values.
///
/// Actions represent:
/// - User inputs (clicks, key presses)
/// - System events (responses, timers)
/// - Internal follow-ups dispatched from effects
///
/// Actions are processed by a [`Reduce`](crate::Reduce) to produce new
/// states and side effects.
pub trait Action: Send + Sync + 'static {}

/// Marker trait for state snapshots.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Self-contained (all data needed by consumers)
/// - Comparable (PartialEq for detecting "no change")
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

/// The `(action, current state)` pair a transition tree is evaluated
/// against. One instance is created per commit attempt and discarded after.
pub struct UpdateSource<A, S> {
    pub action: A,
    pub state: S,
}

impl<A: Action, S: State> UpdateSource<A, S> {
    pub fn new(action: A, state: S) -> Self {
        Self { action, state }
    }

    /// Recover the action after evaluation, e.g. to build the next commit
    /// attempt or the effect source.
    pub fn into_action(self) -> A {
        self.action
    }
}

/// Sink for actions dispatched from inside effect leaves.
///
/// Implemented by the container's queue handle; effect leaves may also hold
/// a dispatcher for a different container entirely.
pub trait Dispatch<A>: Send + Sync {
    fn dispatch(&self, action: A) -> DispatchHandle;
}

/// Evaluation context for effect leaves: the committed `(action, state)`
/// pair plus the capability to dispatch further actions.
pub struct EffectSource<A, S> {
    action: A,
    state: S,
    dispatcher: Arc<dyn Dispatch<A>>,
}

impl<A: Action, S: State> EffectSource<A, S> {
    pub fn new(action: A, state: S, dispatcher: Arc<dyn Dispatch<A>>) -> Self {
        Self {
            action,
            state,
            dispatcher,
        }
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// The state that was current when this dispatch committed, i.e. the
    /// value the transition's output superseded.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Dispatch a follow-up action into the owning container.
    pub fn dispatch(&self, action: A) -> DispatchHandle {
        self.dispatcher.dispatch(action)
    }

    /// Build a source for an action-narrowed child scope. Dispatches from
    /// the child are routed through `embed` back into the parent's action
    /// type.
    pub fn mapped<A2: Action>(
        &self,
        action: A2,
        embed: Arc<dyn Fn(A2) -> A + Send + Sync>,
    ) -> EffectSource<A2, S> {
        EffectSource {
            action,
            state: self.state.clone(),
            dispatcher: Arc::new(EmbeddingDispatcher {
                parent: self.dispatcher.clone(),
                embed,
            }),
        }
    }
}

struct EmbeddingDispatcher<A, A2> {
    parent: Arc<dyn Dispatch<A>>,
    embed: Arc<dyn Fn(A2) -> A + Send + Sync>,
}

impl<A: Action, A2: Action> Dispatch<A2> for EmbeddingDispatcher<A, A2> {
    fn dispatch(&self, action: A2) -> DispatchHandle {
        self.parent.dispatch((*self.embed)(action))
    }
}
