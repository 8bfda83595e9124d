//! Side-effect trees.
//!
//! Effects run after a transition commits, against the `(action, state)`
//! pair that was superseded by the commit. Unlike transitions, composite
//! evaluation fans out: the head runs, then every tail, in declared
//! pre-order, and one failing leaf never suppresses its siblings.

mod evaluator;

pub use evaluator::{EffectContext, EffectEvaluator};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::source::{Action, EffectSource, State};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
pub type SyncEffectFn<A, S> =
    Box<dyn Fn(&EffectSource<A, S>) -> anyhow::Result<()> + Send + Sync>;
pub type AsyncEffectFn<A, S> =
    Box<dyn Fn(Arc<EffectSource<A, S>>) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;
pub type EffectPredicate<A, S> = Box<dyn Fn(&EffectSource<A, S>) -> bool + Send + Sync>;

/// One node of a side-effect tree.
pub enum Effect<A, S> {
    /// Runs inline on the dispatching task.
    Leaf(SyncEffectFn<A, S>),
    /// Launched as an independent task on the container's execution
    /// context; does not block sibling launches.
    SuspendLeaf(AsyncEffectFn<A, S>),
    /// Ordered children; all of them run.
    Composite { children: Vec<Arc<Effect<A, S>>> },
    /// Gate: a false predicate skips the subtree without error.
    PredicateScope {
        predicate: EffectPredicate<A, S>,
        child: Arc<Effect<A, S>>,
    },
    /// Action-narrowing boundary; an absent mapping skips the subtree.
    TransformSourceScope(Box<dyn TransformedEffect<A, S>>),
}

impl<A: Action, S: State> Effect<A, S> {
    pub fn leaf(f: impl Fn(&EffectSource<A, S>) + Send + Sync + 'static) -> Self {
        Self::Leaf(Box::new(move |source| {
            f(source);
            Ok(())
        }))
    }

    /// A synchronous leaf whose work can fail.
    pub fn try_leaf(
        f: impl Fn(&EffectSource<A, S>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::Leaf(Box::new(f))
    }

    pub fn suspend<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<EffectSource<A, S>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::SuspendLeaf(Box::new(
            move |source| -> BoxFuture<anyhow::Result<()>> {
                let fut = f(source);
                Box::pin(async move {
                    fut.await;
                    Ok(())
                })
            },
        ))
    }

    /// A suspending leaf whose work can fail.
    pub fn try_suspend<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<EffectSource<A, S>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::SuspendLeaf(Box::new(
            move |source| -> BoxFuture<anyhow::Result<()>> { Box::pin(f(source)) },
        ))
    }

    /// Builders construct composites only for two or more children.
    pub fn composite(children: Vec<Arc<Effect<A, S>>>) -> Self {
        debug_assert!(children.len() >= 2);
        Self::Composite { children }
    }

    pub fn predicate_scope(
        predicate: impl Fn(&EffectSource<A, S>) -> bool + Send + Sync + 'static,
        child: Arc<Effect<A, S>>,
    ) -> Self {
        Self::PredicateScope {
            predicate: Box::new(predicate),
            child,
        }
    }

    pub fn transform_scope<A2: Action>(
        transform: impl Fn(&EffectSource<A, S>) -> Option<EffectSource<A2, S>>
            + Send
            + Sync
            + 'static,
        child: Arc<Effect<A2, S>>,
    ) -> Self {
        Self::TransformSourceScope(Box::new(TransformScope {
            transform: Box::new(transform),
            child,
            evaluator: EffectEvaluator::new(),
        }))
    }
}

/// Erased action-narrowed subtree; the implementor owns the child tree and
/// its evaluator.
pub trait TransformedEffect<A, S>: Send + Sync {
    fn run(
        &self,
        source: &Arc<EffectSource<A, S>>,
        ctx: &EffectContext,
        tasks: &mut Vec<JoinHandle<()>>,
    );
}

struct TransformScope<A, A2, S> {
    transform: Box<dyn Fn(&EffectSource<A, S>) -> Option<EffectSource<A2, S>> + Send + Sync>,
    child: Arc<Effect<A2, S>>,
    evaluator: EffectEvaluator<A2, S>,
}

impl<A: Action, A2: Action, S: State> TransformedEffect<A, S> for TransformScope<A, A2, S> {
    fn run(
        &self,
        source: &Arc<EffectSource<A, S>>,
        ctx: &EffectContext,
        tasks: &mut Vec<JoinHandle<()>>,
    ) {
        if let Some(mapped) = (self.transform)(source.as_ref()) {
            self.evaluator.run(&self.child, &Arc::new(mapped), ctx, tasks);
        }
    }
}
