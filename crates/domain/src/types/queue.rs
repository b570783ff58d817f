//! Derived queue and drain state exposed to UI and observability code

use serde::{Deserialize, Serialize};

/// Counts of queued mutations per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub pending: u64,
    pub syncing: u64,
    pub failed: u64,
}

impl QueueState {
    pub fn total(&self) -> u64 {
        self.pending.saturating_add(self.syncing).saturating_add(self.failed)
    }

    /// No work waits for the remote store (failed records may remain).
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.syncing == 0
    }

    /// Failed records need an operator to retry or discard them.
    pub fn needs_attention(&self) -> bool {
        self.failed > 0
    }
}

/// Whether the drain worker is currently running a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainState {
    #[default]
    Idle,
    Draining,
}

crate::impl_domain_status_conversions!(DrainState {
    Idle => "idle",
    Draining => "draining"
});
