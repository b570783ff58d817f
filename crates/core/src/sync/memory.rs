//! In-memory mutation queue
//!
//! Non-durable [`MutationQueue`] used by tests and ephemeral clients (kiosk
//! previews, demos). It honours the same ordering and id rules as the SQLite
//! queue: ids start at 1, grow strictly, and are never reused.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use shopsync_domain::constants::MAX_ERROR_REASON_LEN;
use shopsync_domain::{
    truncate_reason, MutationRecord, MutationStatus, NewMutation, QueueState, Result,
};
use tokio::sync::Mutex;

use super::ports::MutationQueue;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, MutationRecord>,
}

/// Volatile mutation queue backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryMutationQueue {
    inner: Mutex<Inner>,
}

impl MemoryMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record regardless of status, in `local_id` order.
    pub async fn snapshot(&self) -> Vec<MutationRecord> {
        self.inner.lock().await.records.values().cloned().collect()
    }

    async fn list_with_status(&self, status: MutationStatus) -> Vec<MutationRecord> {
        self.inner
            .lock()
            .await
            .records
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MutationQueue for MemoryMutationQueue {
    async fn enqueue(&self, mutation: NewMutation) -> Result<MutationRecord> {
        mutation.validate()?;

        let mut inner = self.inner.lock().await;
        inner.next_id = inner.next_id.saturating_add(1);
        let record = MutationRecord::pending(inner.next_id, mutation, Utc::now());
        inner.records.insert(record.local_id, record.clone());
        Ok(record)
    }

    async fn list_pending(&self) -> Result<Vec<MutationRecord>> {
        Ok(self.list_with_status(MutationStatus::Pending).await)
    }

    async fn list_failed(&self) -> Result<Vec<MutationRecord>> {
        Ok(self.list_with_status(MutationStatus::Failed).await)
    }

    async fn get(&self, local_id: i64) -> Result<Option<MutationRecord>> {
        Ok(self.inner.lock().await.records.get(&local_id).cloned())
    }

    async fn mark_status(&self, local_id: i64, status: MutationStatus) -> Result<()> {
        if let Some(record) = self.inner.lock().await.records.get_mut(&local_id) {
            record.status = status;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        local_id: i64,
        status: MutationStatus,
        reason: &str,
    ) -> Result<()> {
        if let Some(record) = self.inner.lock().await.records.get_mut(&local_id) {
            record.status = status;
            record.attempts = record.attempts.saturating_add(1);
            record.last_error = Some(truncate_reason(reason, MAX_ERROR_REASON_LEN));
        }
        Ok(())
    }

    async fn delete(&self, local_id: i64) -> Result<()> {
        self.inner.lock().await.records.remove(&local_id);
        Ok(())
    }

    async fn counts(&self) -> Result<QueueState> {
        let inner = self.inner.lock().await;
        let mut state = QueueState::default();
        for record in inner.records.values() {
            match record.status {
                MutationStatus::Pending => state.pending += 1,
                MutationStatus::Syncing => state.syncing += 1,
                MutationStatus::Failed => state.failed += 1,
            }
        }
        Ok(state)
    }

    async fn requeue_in_flight(&self) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut moved = 0;
        for record in inner.records.values_mut() {
            if record.status == MutationStatus::Syncing {
                record.status = MutationStatus::Pending;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use shopsync_domain::{Payload, ShopSyncError};

    use super::*;

    #[tokio::test]
    async fn ids_are_never_reused_after_delete() {
        let queue = MemoryMutationQueue::new();
        let first = queue.enqueue(NewMutation::insert("ticket", Payload::new())).await.unwrap();
        queue.delete(first.local_id).await.unwrap();
        let second = queue.enqueue(NewMutation::insert("ticket", Payload::new())).await.unwrap();

        assert!(second.local_id > first.local_id);
    }

    #[tokio::test]
    async fn invalid_mutations_never_reach_the_queue() {
        let queue = MemoryMutationQueue::new();
        let err = queue.enqueue(NewMutation::update("ticket", Payload::new())).await.unwrap_err();

        assert!(matches!(err, ShopSyncError::InvalidInput(_)));
        assert_eq!(queue.counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn status_updates_on_missing_records_are_noops() {
        let queue = MemoryMutationQueue::new();
        queue.mark_status(99, MutationStatus::Syncing).await.unwrap();
        queue.record_failure(99, MutationStatus::Failed, "boom").await.unwrap();
        queue.delete(99).await.unwrap();

        assert!(queue.snapshot().await.is_empty());
    }
}
