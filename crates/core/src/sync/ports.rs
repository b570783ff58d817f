//! Port interfaces for sync operations

use async_trait::async_trait;
use shopsync_domain::{
    MutationAction, MutationRecord, MutationStatus, NewMutation, Payload, QueueState, Result,
};

use super::errors::RemoteApplyError;

/// Local durable queue of mutation records.
///
/// Implementations must be write-through: every method that changes state is
/// durable before it returns.
#[async_trait]
pub trait MutationQueue: Send + Sync {
    /// Append a new pending record and return it with its assigned `local_id`.
    async fn enqueue(&self, mutation: NewMutation) -> Result<MutationRecord>;

    /// All pending records ordered by `local_id` ascending.
    async fn list_pending(&self) -> Result<Vec<MutationRecord>>;

    /// All failed records ordered by `local_id` ascending.
    async fn list_failed(&self) -> Result<Vec<MutationRecord>>;

    /// Fetch a single record.
    async fn get(&self, local_id: i64) -> Result<Option<MutationRecord>>;

    /// Transition a record's status. No-op when the record is gone.
    async fn mark_status(&self, local_id: i64, status: MutationStatus) -> Result<()>;

    /// Transition a record's status after a failed attempt, bumping
    /// `attempts` and storing `reason`. No-op when the record is gone.
    async fn record_failure(&self, local_id: i64, status: MutationStatus, reason: &str)
        -> Result<()>;

    /// Remove a record. Deleting a missing record is not an error.
    async fn delete(&self, local_id: i64) -> Result<()>;

    /// Per-status counts.
    async fn counts(&self) -> Result<QueueState>;

    /// Move every `Syncing` record back to `Pending`, returning how many moved.
    async fn requeue_in_flight(&self) -> Result<usize>;
}

/// What the remote store is asked to apply.
#[derive(Debug, Clone, Copy)]
pub struct RemoteMutation<'a> {
    pub action: MutationAction,
    pub resource: &'a str,
    pub payload: &'a Payload,
    pub idempotency_key: &'a str,
}

impl<'a> From<&'a MutationRecord> for RemoteMutation<'a> {
    fn from(record: &'a MutationRecord) -> Self {
        Self {
            action: record.action,
            resource: &record.resource,
            payload: &record.payload,
            idempotency_key: &record.idempotency_key,
        }
    }
}

/// Adapter that performs a create/update against the canonical remote store.
#[async_trait]
pub trait RemoteApplier: Send + Sync {
    /// Apply one mutation. For updates the implementation extracts the primary
    /// key from the payload.
    async fn apply(&self, mutation: &RemoteMutation<'_>) -> std::result::Result<(), RemoteApplyError>;
}
