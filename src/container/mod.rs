//! Dispatch serialization, optimistic commit, and effect launch.
//!
//! One container owns one state cell and one [`Reduce`]. Dispatched actions
//! drain through a single serializer task in strict arrival order; each
//! action's transition is committed with an optimistic compare-and-swap
//! retry, then its effect tree is launched. The caller receives a
//! [`DispatchHandle`] that resolves when the transition has committed and
//! every effect leaf, suspending leaves included, has finished.

mod cell;
mod subscription;

pub use cell::StateCell;
pub use subscription::StateSubscription;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::{self, ExecutionContext, StatekitConfig};
use crate::effect::{Effect, EffectContext, EffectEvaluator};
use crate::handler::{panic_error, EffectFailure, FailureOrigin, HandlerChain};
use crate::reduce::Reduce;
use crate::source::{Action, Dispatch, EffectSource, State, UpdateSource};
use crate::transition::{Transition, TransitionEvaluator};

/// Errors surfaced by [`StateContainer::try_dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The container has been shut down; the action was not enqueued.
    #[error("container is shut down")]
    Closed,
}

/// Awaitable completion of one dispatch's transition+effect chain.
pub struct DispatchHandle {
    done: Option<oneshot::Receiver<()>>,
}

impl DispatchHandle {
    pub(crate) fn pending(done: oneshot::Receiver<()>) -> Self {
        Self { done: Some(done) }
    }

    /// A handle that is already complete, e.g. for a dispatch dropped by a
    /// shut-down container.
    pub(crate) fn resolved() -> Self {
        Self { done: None }
    }

    /// Wait until the transition has committed and every effect leaf of
    /// this dispatch has finished. Resolves immediately if the container
    /// shut down before the action completed.
    pub async fn wait(self) {
        if let Some(done) = self.done {
            let _ = done.await;
        }
    }
}

struct Envelope<A> {
    action: A,
    done: oneshot::Sender<()>,
}

struct QueueDispatcher<A> {
    tx: mpsc::UnboundedSender<Envelope<A>>,
    closed: AtomicBool,
}

impl<A: Action> QueueDispatcher<A> {
    fn send(&self, action: A) -> Option<DispatchHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                action,
                done: done_tx,
            })
            .ok()?;
        Some(DispatchHandle::pending(done_rx))
    }
}

impl<A: Action> Dispatch<A> for QueueDispatcher<A> {
    fn dispatch(&self, action: A) -> DispatchHandle {
        self.send(action).unwrap_or_else(DispatchHandle::resolved)
    }
}

/// Owns a state cell and a [`Reduce`]; serializes dispatched actions,
/// commits transitions with optimistic retry, and launches effects.
pub struct StateContainer<A, S> {
    cell: Arc<StateCell<S>>,
    queue: Arc<QueueDispatcher<A>>,
    bootstrap: Mutex<Option<A>>,
    serializer: AbortHandle,
    effect_tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl<A: Action, S: State> StateContainer<A, S> {
    /// Build with ambient configuration: process-wide defaults if
    /// installed, the current tokio runtime otherwise.
    ///
    /// # Panics
    /// Panics when no execution context can be resolved, i.e. outside a
    /// tokio runtime with no configured default.
    pub fn new(initial: S, reduce: Reduce<A, S>) -> Self {
        Self::builder(initial, reduce).build()
    }

    pub fn builder(initial: S, reduce: Reduce<A, S>) -> ContainerBuilder<A, S> {
        ContainerBuilder {
            initial,
            reduce,
            config: StatekitConfig::new(),
            bootstrap: None,
        }
    }

    fn start(
        initial: S,
        reduce: Reduce<A, S>,
        config: StatekitConfig,
        bootstrap: Option<A>,
    ) -> Self {
        let defaults = config::defaults();
        let execution = config
            .execution
            .or_else(|| defaults.as_ref().and_then(|d| d.execution.clone()))
            .unwrap_or_else(ExecutionContext::current);

        let mut handlers = reduce.handlers().clone();
        if handlers.is_empty() {
            let fallback = config
                .fallback_handler
                .or_else(|| defaults.and_then(|d| d.fallback_handler));
            if let Some(handler) = fallback {
                handlers.push(handler);
            }
        }

        let (transition, effect, _) = reduce.into_parts();
        let cell = Arc::new(StateCell::new(initial));
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(QueueDispatcher {
            tx,
            closed: AtomicBool::new(false),
        });
        let effect_tasks = Arc::new(Mutex::new(Vec::new()));

        let serializer = Serializer {
            cell: cell.clone(),
            transition,
            effect,
            handlers,
            execution: execution.clone(),
            dispatcher: queue.clone(),
            effect_tasks: effect_tasks.clone(),
            transitions: TransitionEvaluator::new(),
            effects: EffectEvaluator::new(),
        };
        let serializer = execution.spawn(serializer.run(rx)).abort_handle();

        Self {
            cell,
            queue,
            bootstrap: Mutex::new(bootstrap),
            serializer,
            effect_tasks,
        }
    }

    /// Enqueue an action. The returned handle resolves once the action's
    /// transition and effects have completed; on a shut-down container it
    /// resolves immediately.
    pub fn dispatch(&self, action: A) -> DispatchHandle {
        self.queue.dispatch(action)
    }

    /// Like [`dispatch`](Self::dispatch), but surfaces a shut-down
    /// container instead of swallowing the action.
    pub fn try_dispatch(&self, action: A) -> Result<DispatchHandle, DispatchError> {
        self.queue.send(action).ok_or(DispatchError::Closed)
    }

    /// A dispatcher decoupled from this container's lifetime, e.g. for
    /// effect sources of another container.
    pub fn dispatcher(&self) -> Arc<dyn Dispatch<A>> {
        self.queue.clone()
    }

    /// Snapshot of the current state without subscribing.
    pub fn state(&self) -> Arc<S> {
        self.cell.load()
    }

    /// Apply `f` to the current state under a compare-and-retry loop, as
    /// an external writer racing the serializer would.
    pub fn update_state(&self, f: impl Fn(&S) -> S) -> Arc<S> {
        self.cell.update(f)
    }

    /// Subscribe to the state stream. The first subscription dispatches
    /// the bootstrap action, if one was configured; later subscriptions
    /// attach without triggering any work.
    pub fn subscribe(&self) -> StateSubscription<S> {
        let rx = self.cell.subscribe();
        if let Some(action) = self.bootstrap.lock().take() {
            tracing::debug!("dispatching bootstrap action on first subscription");
            let _ = self.dispatch(action);
        }
        StateSubscription::new(rx)
    }
}

impl<A, S> StateContainer<A, S> {
    /// Stop accepting actions and cancel the serializer and all in-flight
    /// suspending effects. Idempotent; also invoked on drop.
    pub fn shutdown(&self) {
        if self.queue.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("shutting down state container");
        self.serializer.abort();
        let tasks = std::mem::take(&mut *self.effect_tasks.lock());
        for task in tasks {
            task.abort();
        }
    }
}

impl<A: Action, S: State> Dispatch<A> for StateContainer<A, S> {
    fn dispatch(&self, action: A) -> DispatchHandle {
        StateContainer::dispatch(self, action)
    }
}

impl<A, S> Drop for StateContainer<A, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Step-wise construction of a [`StateContainer`].
pub struct ContainerBuilder<A, S> {
    initial: S,
    reduce: Reduce<A, S>,
    config: StatekitConfig,
    bootstrap: Option<A>,
}

impl<A: Action, S: State> ContainerBuilder<A, S> {
    pub fn config(mut self, config: StatekitConfig) -> Self {
        self.config = config;
        self
    }

    /// Dispatch `action` automatically when the state stream acquires its
    /// first subscriber, instead of at construction time.
    pub fn bootstrap(mut self, action: A) -> Self {
        self.bootstrap = Some(action);
        self
    }

    pub fn build(self) -> StateContainer<A, S> {
        StateContainer::start(self.initial, self.reduce, self.config, self.bootstrap)
    }
}

struct Serializer<A, S> {
    cell: Arc<StateCell<S>>,
    transition: Option<Arc<Transition<A, S>>>,
    effect: Option<Arc<Effect<A, S>>>,
    handlers: HandlerChain,
    execution: ExecutionContext,
    dispatcher: Arc<QueueDispatcher<A>>,
    effect_tasks: Arc<Mutex<Vec<AbortHandle>>>,
    transitions: TransitionEvaluator<A, S>,
    effects: EffectEvaluator<A, S>,
}

impl<A: Action, S: State> Serializer<A, S> {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Envelope<A>>) {
        while let Some(Envelope { action, done }) = rx.recv().await {
            self.process(action, done);
        }
        tracing::debug!("action queue closed, serializer exiting");
    }

    /// Handle one action start to finish: commit its transition, then
    /// launch its effects. Contains no await, so exactly one action is in
    /// flight per container at any time.
    fn process(&self, action: A, done: oneshot::Sender<()>) {
        let (action, before) = match self.commit(action) {
            Ok(committed) => committed,
            Err(()) => {
                // Failed transition: commit skipped, effects skipped.
                let _ = done.send(());
                return;
            }
        };

        let Some(effect) = &self.effect else {
            let _ = done.send(());
            return;
        };

        let source = Arc::new(EffectSource::new(
            action,
            before.as_ref().clone(),
            self.dispatcher.clone() as Arc<dyn Dispatch<A>>,
        ));
        let ctx = EffectContext::new(self.handlers.clone(), self.execution.clone());
        let mut tasks = Vec::new();
        self.effects.run(effect, &source, &ctx, &mut tasks);

        if tasks.is_empty() {
            let _ = done.send(());
            return;
        }

        self.register(&tasks);
        let handlers = self.handlers.clone();
        let waiter = self.execution.spawn(async move {
            for task in tasks {
                match task.await {
                    Ok(()) => {}
                    Err(err) if err.is_panic() => {
                        handlers.dispatch(&EffectFailure::new(
                            FailureOrigin::AsyncEffect,
                            panic_error(err.into_panic()),
                        ));
                    }
                    // Cancelled during shutdown; nothing to report.
                    Err(_) => {}
                }
            }
            let _ = done.send(());
        });
        self.effect_tasks.lock().push(waiter.abort_handle());
    }

    /// Evaluate the transition and commit it with optimistic retry.
    ///
    /// Returns the action and the snapshot the winning write superseded,
    /// which is the pair the effect tree is evaluated against. `Err` means
    /// the transition failed; the failure has already been routed.
    fn commit(&self, action: A) -> Result<(A, Arc<S>), ()> {
        let Some(transition) = &self.transition else {
            return Ok((action, self.cell.load()));
        };

        let mut action = action;
        let mut current = self.cell.load();
        loop {
            let source = UpdateSource::new(action, current.as_ref().clone());
            let result = match catch_unwind(AssertUnwindSafe(|| {
                self.transitions.evaluate(transition, &source)
            })) {
                Ok(result) => result,
                Err(payload) => Err(panic_error(payload)),
            };
            action = source.into_action();

            let next = match result {
                Ok(next) => next,
                Err(error) => {
                    tracing::warn!("transition failed, commit skipped: {:#}", error);
                    self.handlers
                        .dispatch(&EffectFailure::new(FailureOrigin::Transition, error));
                    return Err(());
                }
            };

            if next == *current {
                // No change; nothing to commit or notify.
                return Ok((action, current));
            }
            match self.cell.compare_and_swap(&current, Arc::new(next)) {
                Ok(_) => return Ok((action, current)),
                Err(actual) => {
                    tracing::trace!("state cell changed underneath, retrying transition");
                    current = actual;
                }
            }
        }
    }

    fn register(&self, tasks: &[JoinHandle<()>]) {
        let mut registry = self.effect_tasks.lock();
        registry.retain(|task| !task.is_finished());
        registry.extend(tasks.iter().map(JoinHandle::abort_handle));
    }
}
