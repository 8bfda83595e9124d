//! Pure state-transition trees.
//!
//! A transition computes the next state from an [`UpdateSource`] and does
//! nothing else. The tree is a closed sum type so the evaluator can match
//! every shape exhaustively; no external extension is supported.

mod evaluator;

pub use evaluator::TransitionEvaluator;

use std::sync::Arc;

use crate::source::{Action, State, UpdateSource};

pub type TransitionFn<A, S> =
    Box<dyn Fn(&UpdateSource<A, S>) -> anyhow::Result<S> + Send + Sync>;
pub type TransitionPredicate<A, S> = Box<dyn Fn(&UpdateSource<A, S>) -> bool + Send + Sync>;

/// One node of a transition tree.
pub enum Transition<A, S> {
    /// Pure next-state computation. A returned error is routed to the
    /// handler chain and the commit for that dispatch is skipped.
    Leaf(TransitionFn<A, S>),
    /// Ordered children, tried in declared order; the first result that
    /// differs from the input state wins and the rest are not evaluated.
    Composite { children: Vec<Arc<Transition<A, S>>> },
    /// Gate: a false predicate leaves the state untouched.
    PredicateScope {
        predicate: TransitionPredicate<A, S>,
        child: Arc<Transition<A, S>>,
    },
    /// Action-narrowing boundary. The state type is preserved; an absent
    /// mapping leaves the state untouched.
    TransformSourceScope(Box<dyn TransformedTransition<A, S>>),
}

impl<A: Action, S: State> Transition<A, S> {
    pub fn leaf(f: impl Fn(&UpdateSource<A, S>) -> S + Send + Sync + 'static) -> Self {
        Self::Leaf(Box::new(move |source| Ok(f(source))))
    }

    /// A leaf whose computation can fail.
    pub fn try_leaf(
        f: impl Fn(&UpdateSource<A, S>) -> anyhow::Result<S> + Send + Sync + 'static,
    ) -> Self {
        Self::Leaf(Box::new(f))
    }

    /// Builders construct composites only for two or more children.
    pub fn composite(children: Vec<Arc<Transition<A, S>>>) -> Self {
        debug_assert!(children.len() >= 2);
        Self::Composite { children }
    }

    pub fn predicate_scope(
        predicate: impl Fn(&UpdateSource<A, S>) -> bool + Send + Sync + 'static,
        child: Arc<Transition<A, S>>,
    ) -> Self {
        Self::PredicateScope {
            predicate: Box::new(predicate),
            child,
        }
    }

    pub fn transform_scope<A2: Action>(
        transform: impl Fn(&UpdateSource<A, S>) -> Option<UpdateSource<A2, S>>
            + Send
            + Sync
            + 'static,
        child: Arc<Transition<A2, S>>,
    ) -> Self {
        Self::TransformSourceScope(Box::new(TransformScope {
            transform: Box::new(transform),
            child,
            evaluator: TransitionEvaluator::new(),
        }))
    }
}

/// Erased action-narrowed subtree. The implementor owns the child tree and
/// its evaluator, so the narrowed action type does not leak into the parent
/// tree's type.
pub trait TransformedTransition<A, S>: Send + Sync {
    /// `None` when the mapping declines the source (inactive subtree).
    fn evaluate(&self, source: &UpdateSource<A, S>) -> anyhow::Result<Option<S>>;
}

struct TransformScope<A, A2, S> {
    transform: Box<dyn Fn(&UpdateSource<A, S>) -> Option<UpdateSource<A2, S>> + Send + Sync>,
    child: Arc<Transition<A2, S>>,
    evaluator: TransitionEvaluator<A2, S>,
}

impl<A: Action, A2: Action, S: State> TransformedTransition<A, S> for TransformScope<A, A2, S> {
    fn evaluate(&self, source: &UpdateSource<A, S>) -> anyhow::Result<Option<S>> {
        match (self.transform)(source) {
            Some(mapped) => self.evaluator.evaluate(&self.child, &mapped).map(Some),
            None => Ok(None),
        }
    }
}
