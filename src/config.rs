//! Execution-context and default-handler configuration.
//!
//! A container resolves its execution context and fallback failure handler
//! in three steps: explicit [`StatekitConfig`] passed at construction,
//! process-wide defaults installed with [`install_defaults`], then the
//! ambient tokio runtime. The process-wide slot exists for test harnesses
//! that want one handler across many containers; production code should
//! pass configuration explicitly.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::handler::{EffectFailure, HandlerFn};

/// Where a container schedules its serializer and suspending effect leaves.
#[derive(Clone)]
pub struct ExecutionContext {
    handle: Handle,
}

impl ExecutionContext {
    /// Capture the ambient tokio runtime.
    ///
    /// # Panics
    /// Panics outside of a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

/// Container-level configuration.
#[derive(Clone, Default)]
pub struct StatekitConfig {
    /// Execution context for the serializer and suspending effects.
    pub execution: Option<ExecutionContext>,
    /// Handler used when a reduce declares no `catch` handlers.
    pub fallback_handler: Option<Arc<HandlerFn>>,
}

impl StatekitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution(mut self, execution: ExecutionContext) -> Self {
        self.execution = Some(execution);
        self
    }

    pub fn with_fallback_handler(
        mut self,
        handler: impl Fn(&EffectFailure) + Send + Sync + 'static,
    ) -> Self {
        self.fallback_handler = Some(Arc::new(handler));
        self
    }
}

static DEFAULTS: RwLock<Option<StatekitConfig>> = RwLock::new(None);

/// Install process-wide defaults used by containers built without explicit
/// configuration. Pair with [`clear_defaults`] in test teardown.
pub fn install_defaults(config: StatekitConfig) {
    *DEFAULTS.write() = Some(config);
}

/// Remove previously installed process-wide defaults.
pub fn clear_defaults() {
    *DEFAULTS.write() = None;
}

pub(crate) fn defaults() -> Option<StatekitConfig> {
    DEFAULTS.read().clone()
}
