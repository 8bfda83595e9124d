//! Fan-out evaluation of effect trees.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ExecutionContext;
use crate::handler::{panic_error, EffectFailure, FailureOrigin, HandlerChain};
use crate::pool::StackPool;
use crate::source::{Action, EffectSource, State};

use super::Effect;

/// Ambient wiring handed down during effect evaluation: where failures go
/// and where suspending leaves are launched.
pub struct EffectContext {
    pub(crate) handlers: HandlerChain,
    pub(crate) execution: ExecutionContext,
}

impl EffectContext {
    pub fn new(handlers: HandlerChain, execution: ExecutionContext) -> Self {
        Self {
            handlers,
            execution,
        }
    }
}

/// Evaluates effect trees with a pooled work stack.
///
/// Launch order is declared pre-order. Synchronous leaves run inline with
/// per-leaf failure capture; suspending leaves are spawned and their join
/// handles collected so the dispatch handle can await full completion.
pub struct EffectEvaluator<A, S> {
    pool: StackPool<Arc<Effect<A, S>>>,
}

impl<A: Action, S: State> EffectEvaluator<A, S> {
    pub fn new() -> Self {
        Self {
            pool: StackPool::new(),
        }
    }

    pub fn run(
        &self,
        root: &Arc<Effect<A, S>>,
        source: &Arc<EffectSource<A, S>>,
        ctx: &EffectContext,
        tasks: &mut Vec<JoinHandle<()>>,
    ) {
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
                Effect::Leaf(f) => run_sync_leaf(f, source, ctx),
                Effect::SuspendLeaf(f) => launch_suspend_leaf(f, source, ctx, tasks),
                Effect::Composite { children } => {
                    stack.push_tails_reversed(children);
                    current = children.first().cloned();
                }
                Effect::PredicateScope { predicate, child } => {
                    if predicate(source.as_ref()) {
                        current = Some(child.clone());
                    }
                }
                Effect::TransformSourceScope(scope) => scope.run(source, ctx, tasks),
            }
        }
    }
}

impl<A: Action, S: State> Default for EffectEvaluator<A, S> {
    fn default() -> Self {
        Self::new()
    }
}

fn run_sync_leaf<A: Action, S: State>(
    f: &super::SyncEffectFn<A, S>,
    source: &Arc<EffectSource<A, S>>,
    ctx: &EffectContext,
) {
    let result = match catch_unwind(AssertUnwindSafe(|| f(source.as_ref()))) {
        Ok(result) => result,
        Err(payload) => Err(panic_error(payload)),
    };
    if let Err(error) = result {
        tracing::warn!("effect leaf failed: {:#}", error);
        ctx.handlers
            .dispatch(&EffectFailure::new(FailureOrigin::Effect, error));
    }
}

fn launch_suspend_leaf<A: Action, S: State>(
    f: &super::AsyncEffectFn<A, S>,
    source: &Arc<EffectSource<A, S>>,
    ctx: &EffectContext,
    tasks: &mut Vec<JoinHandle<()>>,
) {
    let fut = match catch_unwind(AssertUnwindSafe(|| f(source.clone()))) {
        Ok(fut) => fut,
        Err(payload) => {
            let error = panic_error(payload);
            tracing::warn!("suspending effect leaf failed to launch: {:#}", error);
            ctx.handlers
                .dispatch(&EffectFailure::new(FailureOrigin::AsyncEffect, error));
            return;
        }
    };
    let handlers = ctx.handlers.clone();
    tasks.push(ctx.execution.spawn(async move {
        if let Err(error) = fut.await {
            tracing::warn!("suspending effect leaf failed: {:#}", error);
            handlers.dispatch(&EffectFailure::new(FailureOrigin::AsyncEffect, error));
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::source::Dispatch;
    use crate::DispatchHandle;

    #[derive(Clone, Debug, PartialEq)]
    struct Ping;

    impl crate::source::Action for Ping {}

    #[derive(Clone, Debug, PartialEq)]
    struct Unit;

    impl crate::source::State for Unit {}

    struct NullDispatcher;

    impl Dispatch<Ping> for NullDispatcher {
        fn dispatch(&self, _action: Ping) -> DispatchHandle {
            DispatchHandle::resolved()
        }
    }

    fn test_source() -> Arc<EffectSource<Ping, Unit>> {
        Arc::new(EffectSource::new(Ping, Unit, Arc::new(NullDispatcher)))
    }

    fn recording_ctx(log: &Arc<Mutex<Vec<String>>>) -> EffectContext {
        let log = log.clone();
        let mut handlers = HandlerChain::new();
        handlers.push(Arc::new(move |failure: &EffectFailure| {
            log.lock().push(format!("handler:{}", failure.origin));
        }));
        EffectContext::new(handlers, ExecutionContext::current())
    }

    fn logging_leaf(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> Arc<Effect<Ping, Unit>> {
        let log = log.clone();
        Arc::new(Effect::leaf(move |_src| {
            log.lock().push(tag.to_string());
        }))
    }

    #[tokio::test]
    async fn composite_runs_every_child_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(&log);
        let evaluator = EffectEvaluator::new();

        let root = Arc::new(Effect::composite(vec![
            logging_leaf(&log, "head"),
            logging_leaf(&log, "second"),
            logging_leaf(&log, "third"),
        ]));

        let mut tasks = Vec::new();
        evaluator.run(&root, &test_source(), &ctx, &mut tasks);

        assert!(tasks.is_empty());
        assert_eq!(*log.lock(), vec!["head", "second", "third"]);
    }

    #[tokio::test]
    async fn failing_leaf_does_not_suppress_siblings() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(&log);
        let evaluator = EffectEvaluator::new();

        let root = Arc::new(Effect::composite(vec![
            logging_leaf(&log, "before"),
            Arc::new(Effect::try_leaf(|_src| anyhow::bail!("broken"))),
            logging_leaf(&log, "after"),
        ]));

        let mut tasks = Vec::new();
        evaluator.run(&root, &test_source(), &ctx, &mut tasks);

        assert_eq!(*log.lock(), vec!["before", "handler:effect", "after"]);
    }

    #[tokio::test]
    async fn panicking_leaf_is_routed_not_propagated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(&log);
        let evaluator = EffectEvaluator::new();

        let root = Arc::new(Effect::composite(vec![
            Arc::new(Effect::leaf(|_src: &EffectSource<Ping, Unit>| {
                panic!("leaf panic")
            })),
            logging_leaf(&log, "survivor"),
        ]));

        let mut tasks = Vec::new();
        evaluator.run(&root, &test_source(), &ctx, &mut tasks);

        assert_eq!(*log.lock(), vec!["handler:effect", "survivor"]);
    }

    #[tokio::test]
    async fn false_predicate_skips_subtree() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(&log);
        let evaluator = EffectEvaluator::new();

        let root = Arc::new(Effect::composite(vec![
            Arc::new(Effect::predicate_scope(
                |_src| false,
                logging_leaf(&log, "gated"),
            )),
            logging_leaf(&log, "open"),
        ]));

        let mut tasks = Vec::new();
        evaluator.run(&root, &test_source(), &ctx, &mut tasks);

        assert_eq!(*log.lock(), vec!["open"]);
    }

    #[tokio::test]
    async fn suspend_leaf_is_collected_not_awaited_inline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = recording_ctx(&log);
        let evaluator = EffectEvaluator::new();

        let task_log = log.clone();
        let root: Arc<Effect<Ping, Unit>> = Arc::new(Effect::suspend(move |_src| {
            let task_log = task_log.clone();
            async move {
                task_log.lock().push("async".to_string());
            }
        }));

        let mut tasks = Vec::new();
        evaluator.run(&root, &test_source(), &ctx, &mut tasks);
        assert_eq!(tasks.len(), 1);

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*log.lock(), vec!["async"]);
    }
}
