//! Queue state reporter
//!
//! Publishes `{pending, syncing, failed}` counts derived from the queue. The
//! watch channel only caches the last computed snapshot for subscribers; the
//! queue stays the single source of truth.

use std::sync::Arc;

use shopsync_domain::{QueueState, Result};
use tokio::sync::watch;
use tracing::debug;

use super::ports::MutationQueue;

/// Derived pending/syncing/failed counts.
pub struct QueueStateReporter {
    queue: Arc<dyn MutationQueue>,
    tx: watch::Sender<QueueState>,
}

impl QueueStateReporter {
    pub fn new(queue: Arc<dyn MutationQueue>) -> Self {
        let (tx, _rx) = watch::channel(QueueState::default());
        Self { queue, tx }
    }

    /// Recompute counts from the queue and publish them.
    pub async fn refresh(&self) -> Result<QueueState> {
        let state = self.queue.counts().await?;
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            debug!(
                pending = state.pending,
                syncing = state.syncing,
                failed = state.failed,
                "Queue state updated"
            );
        }

        Ok(state)
    }

    /// Last published snapshot, without touching storage.
    pub fn latest(&self) -> QueueState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.tx.subscribe()
    }
}
