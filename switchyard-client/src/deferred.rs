//! Single-assignment result cell
//!
//! A [`Deferred`] is a promise that can be settled exactly once, from
//! anywhere, and awaited by any number of tasks. The client uses two of
//! them: `connected` (settled by the `ConnectResponse` handler) and
//! `closed` (settled by teardown), plus one per in-flight unsubscribe.
//!
//! Built on `tokio::sync::watch` so that waiters arriving after settlement
//! observe the value immediately instead of blocking forever.

use std::sync::Arc;
use switchyard_core::{Error, Result};
use tokio::sync::watch;

/// A result cell that is settled at most once.
///
/// Cloning shares the cell; all clones observe the same settlement.
#[derive(Clone)]
pub struct Deferred<T: Clone> {
    cell: Arc<watch::Sender<Option<Result<T>>>>,
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { cell: Arc::new(tx) }
    }

    /// Settle with a value. Later settlements are ignored.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle with an error. Later settlements are ignored.
    pub fn reject(&self, error: Error) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<T>) {
        self.cell.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        });
    }

    /// True once the cell has been settled, either way.
    pub fn is_settled(&self) -> bool {
        self.cell.borrow().is_some()
    }

    /// Wait for settlement. Returns immediately if already settled; safe to
    /// call from any number of tasks.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.cell.subscribe();
        loop {
            // Guard must be dropped before awaiting the change
            {
                let slot = rx.borrow_and_update();
                if let Some(outcome) = slot.as_ref() {
                    return outcome.clone();
                }
            }
            if rx.changed().await.is_err() {
                // All senders gone without settlement; the owner was torn
                // down, so report the cell as abandoned
                return Err(Error::ConnectionAborted);
            }
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}
