//! SQLite-backed implementation of the mutation queue port.
//!
//! Each call checks a connection out of the pool on a blocking thread. With
//! `synchronous=FULL` every statement is durable once the call returns, so
//! the queue survives a crash at any point between operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use shopsync_core::MutationQueue;
use shopsync_domain::constants::MAX_ERROR_REASON_LEN;
use shopsync_domain::{
    truncate_reason, MutationAction, MutationRecord, MutationStatus, NewMutation, Payload,
    QueueState, Result as DomainResult, ShopSyncError,
};
use tokio::task;
use tracing::{debug, warn};

use super::manager::DbManager;
use crate::errors::InfraError;

/// Durable FIFO of pending remote writes.
pub struct SqliteMutationQueue {
    db: Arc<DbManager>,
}

impl SqliteMutationQueue {
    /// Construct a queue backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run `op` with a pooled connection on the blocking pool.
    async fn with_connection<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<T> {
            let conn = db.get_connection()?;
            op(&*conn)
        })
        .await
        .map_err(map_join_error)?
    }

    fn insert(conn: &Connection, mutation: NewMutation) -> DomainResult<MutationRecord> {
        let created_at = Utc::now();
        let idempotency_key = shopsync_domain::generate_idempotency_key();
        let payload_json = serde_json::to_string(&mutation.payload).map_err(|err| {
            ShopSyncError::InvalidInput(format!("payload is not serialisable: {err}"))
        })?;

        conn.execute(
            QUEUE_INSERT_SQL,
            params![
                mutation.action.to_string(),
                mutation.resource,
                payload_json,
                MutationStatus::Pending.to_string(),
                format_timestamp(created_at),
                idempotency_key.as_str(),
            ],
        )
        .map_err(InfraError::from)?;

        Ok(MutationRecord::pending_with_key(
            conn.last_insert_rowid(),
            mutation,
            created_at,
            idempotency_key,
        ))
    }

    fn fetch_by_status(
        conn: &Connection,
        status: MutationStatus,
    ) -> DomainResult<Vec<MutationRecord>> {
        let mut stmt = conn.prepare(QUEUE_SELECT_BY_STATUS_SQL).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![status.to_string()], map_queue_row)
            .map_err(InfraError::from)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(InfraError::from)?;
        Ok(records)
    }

    /// Pending rows plus any row whose status text is not recognised, which
    /// [`map_queue_row`] reads back as pending.
    fn fetch_pending(conn: &Connection) -> DomainResult<Vec<MutationRecord>> {
        let mut stmt = conn.prepare(QUEUE_SELECT_PENDING_SQL).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(
                params![
                    MutationStatus::Pending.to_string(),
                    MutationStatus::Syncing.to_string(),
                    MutationStatus::Failed.to_string(),
                ],
                map_queue_row,
            )
            .map_err(InfraError::from)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(InfraError::from)?;
        Ok(records)
    }
}

#[async_trait]
impl MutationQueue for SqliteMutationQueue {
    async fn enqueue(&self, mutation: NewMutation) -> DomainResult<MutationRecord> {
        mutation.validate()?;

        let record = self.with_connection(move |conn| Self::insert(conn, mutation)).await?;
        debug!(
            local_id = record.local_id,
            action = %record.action,
            resource = %record.resource,
            "mutation persisted"
        );
        Ok(record)
    }

    async fn list_pending(&self) -> DomainResult<Vec<MutationRecord>> {
        self.with_connection(Self::fetch_pending).await
    }

    async fn list_failed(&self) -> DomainResult<Vec<MutationRecord>> {
        self.with_connection(|conn| Self::fetch_by_status(conn, MutationStatus::Failed)).await
    }

    async fn get(&self, local_id: i64) -> DomainResult<Option<MutationRecord>> {
        self.with_connection(move |conn| {
            conn.query_row(QUEUE_SELECT_ONE_SQL, params![local_id], map_queue_row)
                .optional()
                .map_err(|err| InfraError::from(err).into())
        })
        .await
    }

    async fn mark_status(&self, local_id: i64, status: MutationStatus) -> DomainResult<()> {
        self.with_connection(move |conn| {
            conn.execute(QUEUE_UPDATE_STATUS_SQL, params![status.to_string(), local_id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }

    async fn record_failure(
        &self,
        local_id: i64,
        status: MutationStatus,
        reason: &str,
    ) -> DomainResult<()> {
        let reason = truncate_reason(reason, MAX_ERROR_REASON_LEN);
        self.with_connection(move |conn| {
            conn.execute(QUEUE_RECORD_FAILURE_SQL, params![status.to_string(), reason, local_id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, local_id: i64) -> DomainResult<()> {
        self.with_connection(move |conn| {
            conn.execute(QUEUE_DELETE_SQL, params![local_id]).map_err(InfraError::from)?;
            Ok(())
        })
        .await
    }

    async fn counts(&self) -> DomainResult<QueueState> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(QUEUE_COUNTS_SQL).map_err(InfraError::from)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(InfraError::from)?;

            let mut state = QueueState::default();
            for row in rows {
                let (raw_status, count) = row.map_err(InfraError::from)?;
                let count = u64::try_from(count).unwrap_or_default();
                match raw_status.parse::<MutationStatus>() {
                    Ok(MutationStatus::Pending) => state.pending += count,
                    Ok(MutationStatus::Syncing) => state.syncing += count,
                    Ok(MutationStatus::Failed) => state.failed += count,
                    Err(err) => {
                        warn!(
                            raw_status = %raw_status,
                            error = %err,
                            count,
                            "unknown queue status in counts – counting as pending"
                        );
                        state.pending += count;
                    }
                }
            }
            Ok(state)
        })
        .await
    }

    async fn requeue_in_flight(&self) -> DomainResult<usize> {
        self.with_connection(|conn| {
            conn.execute(
                QUEUE_REQUEUE_SQL,
                params![MutationStatus::Pending.to_string(), MutationStatus::Syncing.to_string()],
            )
            .map_err(|err| InfraError::from(err).into())
        })
        .await
    }
}

const QUEUE_INSERT_SQL: &str = "INSERT INTO sync_queue (
        action, resource, payload_json, status, created_at, idempotency_key
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const QUEUE_SELECT_BY_STATUS_SQL: &str = "SELECT
        local_id, action, resource, payload_json, status, created_at, idempotency_key,
        attempts, last_error
    FROM sync_queue
    WHERE status = ?1
    ORDER BY local_id ASC";

const QUEUE_SELECT_PENDING_SQL: &str = "SELECT
        local_id, action, resource, payload_json, status, created_at, idempotency_key,
        attempts, last_error
    FROM sync_queue
    WHERE status = ?1 OR status NOT IN (?1, ?2, ?3)
    ORDER BY local_id ASC";

const QUEUE_SELECT_ONE_SQL: &str = "SELECT
        local_id, action, resource, payload_json, status, created_at, idempotency_key,
        attempts, last_error
    FROM sync_queue
    WHERE local_id = ?1";

const QUEUE_UPDATE_STATUS_SQL: &str = "UPDATE sync_queue SET status = ?1 WHERE local_id = ?2";

const QUEUE_RECORD_FAILURE_SQL: &str =
    "UPDATE sync_queue SET status = ?1, attempts = attempts + 1, last_error = ?2 WHERE local_id = ?3";

const QUEUE_DELETE_SQL: &str = "DELETE FROM sync_queue WHERE local_id = ?1";

const QUEUE_COUNTS_SQL: &str = "SELECT status, COUNT(*) FROM sync_queue GROUP BY status";

const QUEUE_REQUEUE_SQL: &str = "UPDATE sync_queue SET status = ?1 WHERE status = ?2";

fn map_queue_row(row: &Row<'_>) -> rusqlite::Result<MutationRecord> {
    let local_id: i64 = row.get(0)?;
    let action_raw: String = row.get(1)?;
    let payload_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let created_raw: String = row.get(5)?;

    let action = action_raw.parse::<MutationAction>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, err.into())
    })?;
    let payload: Payload = serde_json::from_str(&payload_raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(MutationRecord {
        local_id,
        action,
        resource: row.get(2)?,
        payload,
        status: parse_status(local_id, &status_raw),
        created_at: parse_timestamp(local_id, &created_raw),
        idempotency_key: row.get(6)?,
        attempts: row.get(7)?,
        last_error: row.get(8)?,
    })
}

fn parse_status(local_id: i64, raw: &str) -> MutationStatus {
    match raw.parse::<MutationStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(
                local_id,
                raw_status = %raw,
                error = %err,
                "invalid queue status returned by SQLite – defaulting to pending"
            );
            MutationStatus::Pending
        }
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(local_id: i64, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(value) => value.with_timezone(&Utc),
        Err(err) => {
            warn!(local_id, raw_created_at = %raw, error = %err, "invalid created_at in queue");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

fn map_join_error(err: task::JoinError) -> ShopSyncError {
    if err.is_cancelled() {
        ShopSyncError::Internal("queue task cancelled".into())
    } else {
        ShopSyncError::Internal(format!("queue task panic: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn ticket(customer: &str) -> NewMutation {
        let payload = json!({ "customer": customer }).as_object().cloned().unwrap();
        NewMutation::insert("repair_tickets", payload)
    }

    async fn setup_queue() -> (SqliteMutationQueue, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);
        let queue = SqliteMutationQueue::new(Arc::clone(&manager));

        (queue, manager, temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_and_list_pending_in_order() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let a = queue.enqueue(ticket("Ada")).await.expect("enqueue a");
        let b = queue.enqueue(ticket("Bob")).await.expect("enqueue b");

        let pending = queue.list_pending().await.expect("list pending");
        assert_eq!(pending, vec![a.clone(), b.clone()]);
        assert!(a.local_id < b.local_id);
        assert_ne!(a.idempotency_key, b.idempotency_key);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_ids_are_not_reused_after_delete() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let first = queue.enqueue(ticket("Ada")).await.unwrap();
        queue.delete(first.local_id).await.unwrap();
        let second = queue.enqueue(ticket("Bob")).await.unwrap();

        assert!(second.local_id > first.local_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_failure_tracks_attempts_and_reason() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let record = queue.enqueue(ticket("Ada")).await.unwrap();

        queue.record_failure(record.local_id, MutationStatus::Pending, "HTTP 503").await.unwrap();
        queue
            .record_failure(record.local_id, MutationStatus::Failed, &"x".repeat(1_000))
            .await
            .unwrap();

        let stored = queue.get(record.local_id).await.unwrap().expect("record exists");
        assert_eq!(stored.status, MutationStatus::Failed);
        assert_eq!(stored.attempts, 2);
        assert!(stored.last_error.unwrap().chars().count() <= MAX_ERROR_REASON_LEN);
        assert_eq!(queue.list_failed().await.unwrap().len(), 1);
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counts_and_requeue_in_flight() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let a = queue.enqueue(ticket("Ada")).await.unwrap();
        let b = queue.enqueue(ticket("Bob")).await.unwrap();
        queue.enqueue(ticket("Cy")).await.unwrap();
        queue.mark_status(a.local_id, MutationStatus::Syncing).await.unwrap();
        queue.mark_status(b.local_id, MutationStatus::Failed).await.unwrap();

        assert_eq!(queue.counts().await.unwrap(), QueueState { pending: 1, syncing: 1, failed: 1 });

        assert_eq!(queue.requeue_in_flight().await.unwrap(), 1);
        assert_eq!(queue.counts().await.unwrap(), QueueState { pending: 2, syncing: 0, failed: 1 });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn operations_on_missing_records_are_noops() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        queue.mark_status(42, MutationStatus::Syncing).await.unwrap();
        queue.record_failure(42, MutationStatus::Failed, "gone").await.unwrap();
        queue.delete(42).await.unwrap();

        assert!(queue.get(42).await.unwrap().is_none());
        assert_eq!(queue.counts().await.unwrap(), QueueState::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_update_is_not_persisted() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let payload = json!({ "status": "done" }).as_object().cloned().unwrap();

        let err = queue.enqueue(NewMutation::update("repair_tickets", payload)).await.unwrap_err();

        assert!(matches!(err, ShopSyncError::InvalidInput(_)));
        assert_eq!(queue.counts().await.unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_status_defaults_to_pending() {
        let (queue, manager, _temp_dir) = setup_queue().await;
        let record = queue.enqueue(ticket("Ada")).await.unwrap();

        {
            let conn = manager.get_connection().unwrap();
            conn.execute_batch("PRAGMA ignore_check_constraints = ON;").unwrap();
            conn.execute(
                "UPDATE sync_queue SET status = 'weird' WHERE local_id = ?1",
                params![record.local_id],
            )
            .unwrap();
            conn.execute_batch("PRAGMA ignore_check_constraints = OFF;").unwrap();
        }

        let stored = queue.get(record.local_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MutationStatus::Pending);

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, record.local_id);
        assert_eq!(pending[0].idempotency_key, record.idempotency_key);
        assert!(queue.list_failed().await.unwrap().is_empty());

        let state = queue.counts().await.unwrap();
        assert_eq!(state, QueueState { pending: 1, syncing: 0, failed: 0 });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_status_keeps_its_place_in_line() {
        let (queue, manager, _temp_dir) = setup_queue().await;
        let first = queue.enqueue(ticket("Ada")).await.unwrap();
        let second = queue.enqueue(ticket("Bob")).await.unwrap();
        queue.mark_status(second.local_id, MutationStatus::Syncing).await.unwrap();
        let third = queue.enqueue(ticket("Cy")).await.unwrap();

        {
            let conn = manager.get_connection().unwrap();
            conn.execute_batch("PRAGMA ignore_check_constraints = ON;").unwrap();
            conn.execute(
                "UPDATE sync_queue SET status = '' WHERE local_id = ?1",
                params![first.local_id],
            )
            .unwrap();
            conn.execute_batch("PRAGMA ignore_check_constraints = OFF;").unwrap();
        }

        let ids: Vec<i64> =
            queue.list_pending().await.unwrap().iter().map(|r| r.local_id).collect();
        assert_eq!(ids, vec![first.local_id, third.local_id]);

        let state = queue.counts().await.unwrap();
        assert_eq!(state, QueueState { pending: 2, syncing: 1, failed: 0 });
    }
}
