//! Iterative evaluation of transition trees.

use std::sync::Arc;

use crate::pool::StackPool;
use crate::source::{Action, State, UpdateSource};

use super::Transition;

/// Evaluates transition trees with a pooled work stack, so arbitrarily deep
/// composites traverse without recursion and without allocating on repeat
/// dispatches. Transform boundaries enter the child evaluator owned by the
/// scope node.
pub struct TransitionEvaluator<A, S> {
    pool: StackPool<Arc<Transition<A, S>>>,
}

impl<A: Action, S: State> TransitionEvaluator<A, S> {
    pub fn new() -> Self {
        Self {
            pool: StackPool::new(),
        }
    }

    /// Compute the next state for `source`.
    ///
    /// Children are visited depth-first in declared order. The first leaf
    /// or transform result that differs from the input state is returned
    /// immediately; when nothing changes, the input state is returned.
    pub fn evaluate(
        &self,
        root: &Arc<Transition<A, S>>,
        source: &UpdateSource<A, S>,
    ) -> anyhow::Result<S> {
        let input = &source.state;
        let mut stack = self.pool.request();
        let mut current = Some(root.clone());

        loop {
            let node = match current.take() {
                Some(node) => node,
                None => match stack.pop() {
                    Some(node) => node,
                    None => break,
                },
            };

            match &*node {
                Transition::Leaf(f) => {
                    let next = f(source)?;
                    if next != *input {
                        return Ok(next);
                    }
                }
                Transition::Composite { children } => {
                    stack.push_tails_reversed(children);
                    current = children.first().cloned();
                }
                Transition::PredicateScope { predicate, child } => {
                    if predicate(source) {
                        current = Some(child.clone());
                    }
                }
                Transition::TransformSourceScope(scope) => {
                    if let Some(next) = scope.evaluate(source)? {
                        if next != *input {
                            return Ok(next);
                        }
                    }
                }
            }
        }

        Ok(input.clone())
    }
}

impl<A: Action, S: State> Default for TransitionEvaluator<A, S> {
    fn default() -> Self {
        Self::new()
    }
}
