//! Latest-value-replay observation of container state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::source::State;

/// Subscription to a container's state stream.
///
/// Hot and conflated: [`current`](Self::current) always returns the latest
/// committed value, and [`next`](Self::next) wakes for new commits, possibly
/// skipping intermediates. Subscribing performs no work beyond attaching to
/// the shared cell.
pub struct StateSubscription<S> {
    rx: watch::Receiver<Arc<S>>,
}

impl<S: State> StateSubscription<S> {
    pub(crate) fn new(rx: watch::Receiver<Arc<S>>) -> Self {
        Self { rx }
    }

    /// The latest committed state.
    pub fn current(&self) -> Arc<S> {
        self.rx.borrow().clone()
    }

    /// Wait for a commit this subscription has not observed yet. Returns
    /// `None` once the owning container is gone.
    pub async fn next(&mut self) -> Option<Arc<S>> {
        self.rx.changed().await.ok()?;
        let value = self.rx.borrow_and_update().clone();
        Some(value)
    }
}
