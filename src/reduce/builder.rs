//! Scoped builders assembling transition and effect trees.
//!
//! Call sites declare leaves and nested scopes; the builders accumulate
//! nodes and collapse by arity on build: nothing declared builds nothing,
//! a single leaf is stored unwrapped, two or more become a composite in
//! declaration order.

use std::future::Future;
use std::sync::Arc;

use crate::effect::Effect;
use crate::handler::{EffectFailure, HandlerChain};
use crate::source::{Action, EffectSource, State, UpdateSource};
use crate::transition::Transition;

use super::{Reduce, ScopeId};

/// Accumulator for transition nodes.
pub struct TransitionBuilder<A, S> {
    nodes: Vec<Arc<Transition<A, S>>>,
}

impl<A: Action, S: State> TransitionBuilder<A, S> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn add(&mut self, node: Transition<A, S>) {
        self.nodes.push(Arc::new(node));
    }

    /// Append an already-built subtree, e.g. a child scope's output.
    pub fn add_shared(&mut self, node: Arc<Transition<A, S>>) {
        self.nodes.push(node);
    }

    /// `None` for an empty builder, the sole node unwrapped for one,
    /// a composite preserving declaration order otherwise.
    pub fn build(self) -> Option<Arc<Transition<A, S>>> {
        let mut nodes = self.nodes;
        match nodes.len() {
            0 => None,
            1 => nodes.pop(),
            _ => Some(Arc::new(Transition::composite(nodes))),
        }
    }
}

impl<A: Action, S: State> Default for TransitionBuilder<A, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulator for effect nodes.
pub struct EffectBuilder<A, S> {
    nodes: Vec<Arc<Effect<A, S>>>,
}

impl<A: Action, S: State> EffectBuilder<A, S> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn add(&mut self, node: Effect<A, S>) {
        self.nodes.push(Arc::new(node));
    }

    /// Append an already-built subtree, e.g. a child scope's output.
    pub fn add_shared(&mut self, node: Arc<Effect<A, S>>) {
        self.nodes.push(node);
    }

    /// Same arity collapse as [`TransitionBuilder::build`].
    pub fn build(self) -> Option<Arc<Effect<A, S>>> {
        let mut nodes = self.nodes;
        match nodes.len() {
            0 => None,
            1 => nodes.pop(),
            _ => Some(Arc::new(Effect::composite(nodes))),
        }
    }
}

impl<A: Action, S: State> Default for EffectBuilder<A, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one scope: accumulates transition leaves, effect leaves and
/// `catch` handlers, and folds fully built child scopes into itself.
///
/// The same type serves as the top-level entry point
/// ([`Reduce::builder`], [`reduce`](crate::reduce())) and as the delegate
/// handed to nested scope closures.
pub struct ReduceBuilder<A, S> {
    scope_id: ScopeId,
    transitions: TransitionBuilder<A, S>,
    effects: EffectBuilder<A, S>,
    handlers: HandlerChain,
}

impl<A: Action, S: State> ReduceBuilder<A, S> {
    pub fn new() -> Self {
        Self {
            scope_id: ScopeId::fresh(),
            transitions: TransitionBuilder::new(),
            effects: EffectBuilder::new(),
            handlers: HandlerChain::new(),
        }
    }

    // ---- leaves --------------------------------------------------------

    /// Declare a pure transition leaf.
    pub fn transition(
        &mut self,
        f: impl Fn(&UpdateSource<A, S>) -> S + Send + Sync + 'static,
    ) -> &mut Self {
        self.transitions.add(Transition::leaf(f));
        self
    }

    /// Declare a transition leaf whose computation can fail; failures are
    /// routed to the handler chain and skip the commit.
    pub fn try_transition(
        &mut self,
        f: impl Fn(&UpdateSource<A, S>) -> anyhow::Result<S> + Send + Sync + 'static,
    ) -> &mut Self {
        self.transitions.add(Transition::try_leaf(f));
        self
    }

    /// Declare a synchronous effect leaf.
    pub fn effect(
        &mut self,
        f: impl Fn(&EffectSource<A, S>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.effects.add(Effect::leaf(f));
        self
    }

    /// Declare a synchronous effect leaf whose work can fail.
    pub fn try_effect(
        &mut self,
        f: impl Fn(&EffectSource<A, S>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.effects.add(Effect::try_leaf(f));
        self
    }

    /// Declare a suspending effect leaf, launched as an independent task.
    pub fn suspend_effect<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<EffectSource<A, S>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.effects.add(Effect::suspend(f));
        self
    }

    /// Declare a suspending effect leaf whose work can fail.
    pub fn try_suspend_effect<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<EffectSource<A, S>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.effects.add(Effect::try_suspend(f));
        self
    }

    /// Register a failure handler. Handlers run in registration order for
    /// every failure raised inside this reduce's evaluation.
    pub fn catch(
        &mut self,
        handler: impl Fn(&EffectFailure) + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    // ---- child scopes --------------------------------------------------

    /// Declare a predicate-guarded scope over the full `(action, state)`
    /// pair.
    pub fn scope(
        &mut self,
        predicate: impl Fn(&A, &S) -> bool + Send + Sync + 'static,
        body: impl FnOnce(&mut ReduceBuilder<A, S>),
    ) -> &mut Self {
        let mut child = ReduceBuilder::new();
        body(&mut child);
        self.add_predicate_scope(predicate, child.build())
    }

    /// Declare a scope active only for matching states.
    pub fn state_scope(
        &mut self,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
        body: impl FnOnce(&mut ReduceBuilder<A, S>),
    ) -> &mut Self {
        self.scope(move |_action, state| predicate(state), body)
    }

    /// Declare a scope keyed on a narrower action type. `extract` selects
    /// and maps matching actions; `embed` routes the child scope's
    /// dispatches back into the parent action type.
    pub fn action_scope<A2: Action>(
        &mut self,
        extract: impl Fn(&A) -> Option<A2> + Send + Sync + 'static,
        embed: impl Fn(A2) -> A + Send + Sync + 'static,
        body: impl FnOnce(&mut ReduceBuilder<A2, S>),
    ) -> &mut Self {
        let mut child = ReduceBuilder::new();
        body(&mut child);
        self.add_transform_scope(extract, embed, child.build())
    }

    /// Declare an unconditional grouping scope.
    pub fn group(&mut self, body: impl FnOnce(&mut ReduceBuilder<A, S>)) -> &mut Self {
        let mut child = ReduceBuilder::new();
        body(&mut child);
        self.add_scope(child.build())
    }

    /// Merge a fully built child unconditionally. A child that built
    /// nothing leaves this builder untouched.
    pub fn add_scope(&mut self, child: Reduce<A, S>) -> &mut Self {
        let (transition, effect, handlers) = child.into_parts();
        if let Some(node) = transition {
            self.transitions.add_shared(node);
        }
        if let Some(node) = effect {
            self.effects.add_shared(node);
        }
        self.handlers.extend(&handlers);
        self
    }

    /// Merge a fully built child behind a predicate gate.
    pub fn add_predicate_scope(
        &mut self,
        predicate: impl Fn(&A, &S) -> bool + Send + Sync + 'static,
        child: Reduce<A, S>,
    ) -> &mut Self {
        let predicate = Arc::new(predicate);
        let (transition, effect, handlers) = child.into_parts();
        if let Some(node) = transition {
            let predicate = predicate.clone();
            self.transitions.add(Transition::predicate_scope(
                move |src: &UpdateSource<A, S>| (*predicate)(&src.action, &src.state),
                node,
            ));
        }
        if let Some(node) = effect {
            self.effects.add(Effect::predicate_scope(
                move |src: &EffectSource<A, S>| (*predicate)(src.action(), src.state()),
                node,
            ));
        }
        self.handlers.extend(&handlers);
        self
    }

    /// Merge a fully built child behind an action-narrowing boundary.
    pub fn add_transform_scope<A2: Action>(
        &mut self,
        extract: impl Fn(&A) -> Option<A2> + Send + Sync + 'static,
        embed: impl Fn(A2) -> A + Send + Sync + 'static,
        child: Reduce<A2, S>,
    ) -> &mut Self {
        let extract = Arc::new(extract);
        let embed: Arc<dyn Fn(A2) -> A + Send + Sync> = Arc::new(embed);
        let (transition, effect, handlers) = child.into_parts();
        if let Some(node) = transition {
            let extract = extract.clone();
            self.transitions.add(Transition::transform_scope(
                move |src: &UpdateSource<A, S>| {
                    (*extract)(&src.action)
                        .map(|action| UpdateSource::new(action, src.state.clone()))
                },
                node,
            ));
        }
        if let Some(node) = effect {
            self.effects.add(Effect::transform_scope(
                move |src: &EffectSource<A, S>| {
                    (*extract)(src.action()).map(|action| src.mapped(action, embed.clone()))
                },
                node,
            ));
        }
        self.handlers.extend(&handlers);
        self
    }

    /// Finish the scope. See [`TransitionBuilder::build`] for the arity
    /// collapse applied to each tree.
    pub fn build(self) -> Reduce<A, S> {
        Reduce::new(
            self.scope_id,
            self.transitions.build(),
            self.effects.build(),
            self.handlers,
        )
    }
}

impl<A: Action, S: State> Default for ReduceBuilder<A, S> {
    fn default() -> Self {
        Self::new()
    }
}
