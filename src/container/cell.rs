//! The concurrently-mutable state cell.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::source::State;

/// Holder of the current state.
///
/// Writes go through [`StateCell::compare_and_swap`] only: replace with an
/// expected previous value, never unguarded read-then-write. The container
/// is not assumed to be the sole writer.
pub struct StateCell<S> {
    current: ArcSwap<S>,
    watch_tx: watch::Sender<Arc<S>>,
}

impl<S: State> StateCell<S> {
    pub fn new(initial: S) -> Self {
        let initial = Arc::new(initial);
        let (watch_tx, _) = watch::channel(initial.clone());
        Self {
            current: ArcSwap::new(initial),
            watch_tx,
        }
    }

    /// Snapshot of the current state.
    pub fn load(&self) -> Arc<S> {
        self.current.load_full()
    }

    /// Attempt to replace `expected` with `next`.
    ///
    /// Pointer comparison: the swap succeeds only when the cell still
    /// holds the exact snapshot that was read. On success observers are
    /// notified and the committed snapshot is returned; on interference
    /// the now-current value is returned for the caller to retry against.
    pub fn compare_and_swap(&self, expected: &Arc<S>, next: Arc<S>) -> Result<Arc<S>, Arc<S>> {
        let prev = self.current.compare_and_swap(expected, next.clone());
        if Arc::ptr_eq(&prev, expected) {
            // Notify with the cell's current value so a late notification
            // can never roll the stream back behind a concurrent writer.
            self.watch_tx.send_replace(self.current.load_full());
            Ok(next)
        } else {
            Err(Arc::clone(&prev))
        }
    }

    /// Apply `f` under a compare-and-retry loop. This is the entry point
    /// for writers other than the owning container's serializer.
    pub fn update<F>(&self, f: F) -> Arc<S>
    where
        F: Fn(&S) -> S,
    {
        let mut current = self.load();
        loop {
            let next = Arc::new(f(&current));
            match self.compare_and_swap(&current, next) {
                Ok(committed) => return committed,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.watch_tx.subscribe()
    }
}
