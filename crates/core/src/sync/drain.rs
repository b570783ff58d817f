//! Sync drain worker.
//!
//! Walks the pending mutations in `local_id` order and applies each one to
//! the remote store. At most one drain runs at a time; a trigger that finds
//! the gate held returns immediately and asks the running drain to look
//! again before it finishes, so records enqueued mid-drain are never
//! stranded until the next external trigger.
//!
//! Per record:
//!
//! 1. mark `Syncing`
//! 2. apply remotely under `apply_timeout`
//! 3. success → delete; retryable failure → back to `Pending`; permanent
//!    failure → `Failed`
//!
//! A failing record never stops the records behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shopsync_domain::{DrainState, MutationRecord, MutationStatus, Result};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use super::errors::RemoteApplyError;
use super::ports::{MutationQueue, RemoteApplier, RemoteMutation};
use super::reporter::QueueStateReporter;

/// Typed result of one apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Applied,
    /// Transient failure; the record goes back to pending.
    Retry(RemoteApplyError),
    /// Permanent failure; the record is parked as failed.
    Rejected(RemoteApplyError),
}

impl AttemptOutcome {
    pub fn from_result(result: std::result::Result<(), RemoteApplyError>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(err) if err.should_retry() => Self::Retry(err),
            Err(err) => Self::Rejected(err),
        }
    }
}

/// Counters for one `trigger` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue scans that found work.
    pub passes: u32,
    pub attempted: u32,
    pub applied: u32,
    pub retried: u32,
    pub rejected: u32,
    /// Local storage failures while updating individual records.
    pub storage_errors: u32,
    pub duration: Duration,
}

/// What happened to a drain trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain held the gate; this trigger was folded into it.
    AlreadyRunning,
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Single-flight consumer of the mutation queue.
pub struct SyncDrainWorker {
    queue: Arc<dyn MutationQueue>,
    applier: Arc<dyn RemoteApplier>,
    reporter: Arc<QueueStateReporter>,
    apply_timeout: Duration,
    gate: Mutex<()>,
    rerun_requested: AtomicBool,
    state: watch::Sender<DrainState>,
}

impl SyncDrainWorker {
    pub fn new(
        queue: Arc<dyn MutationQueue>,
        applier: Arc<dyn RemoteApplier>,
        reporter: Arc<QueueStateReporter>,
        apply_timeout: Duration,
    ) -> Self {
        let (state, _rx) = watch::channel(DrainState::Idle);
        Self {
            queue,
            applier,
            reporter,
            apply_timeout,
            gate: Mutex::new(()),
            rerun_requested: AtomicBool::new(false),
            state,
        }
    }

    pub fn state(&self) -> DrainState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DrainState> {
        self.state.subscribe()
    }

    /// Run a drain unless one is already in progress.
    ///
    /// # Errors
    /// Returns the storage error when the pending list cannot be read. Per
    /// record failures never surface here; they are counted in the report.
    #[instrument(skip(self))]
    pub async fn trigger(&self) -> Result<DrainOutcome> {
        let started = Instant::now();
        let mut report = DrainReport::default();
        let mut high_water = i64::MIN;
        let mut ran = false;

        loop {
            // Raised before probing the gate so a holder that is about to
            // release still sees the request.
            self.rerun_requested.store(true, Ordering::SeqCst);
            let Ok(guard) = self.gate.try_lock() else {
                if ran {
                    // Someone else owns the gate now and will see the flag.
                    break;
                }
                debug!("Drain already in progress; trigger folded into it");
                return Ok(DrainOutcome::AlreadyRunning);
            };

            ran = true;
            self.publish_state(DrainState::Draining);

            let result = self.drain_while_requested(&mut high_water, &mut report).await;
            // Idle goes out while the gate is still held so it can never
            // overwrite the state of a drain that starts right after.
            self.publish_state(DrainState::Idle);
            drop(guard);

            if let Err(err) = result {
                error!(error = %err, "Drain aborted: pending mutations could not be listed");
                self.refresh_reporter().await;
                return Err(err);
            }

            if !self.rerun_requested.load(Ordering::SeqCst) {
                break;
            }
            debug!("Trigger arrived while releasing the gate; rescanning the queue");
            high_water = i64::MIN;
        }

        report.duration = started.elapsed();
        self.refresh_reporter().await;

        if report.attempted > 0 {
            info!(
                passes = report.passes,
                attempted = report.attempted,
                applied = report.applied,
                retried = report.retried,
                rejected = report.rejected,
                storage_errors = report.storage_errors,
                duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
                "Drain completed"
            );
        } else {
            debug!("Drain found no pending mutations");
        }

        Ok(DrainOutcome::Completed(report))
    }

    /// Drain until quiet, then once more from the head of the queue for
    /// every trigger folded in meanwhile. Called with the gate held.
    async fn drain_while_requested(
        &self,
        high_water: &mut i64,
        report: &mut DrainReport,
    ) -> Result<()> {
        loop {
            self.rerun_requested.store(false, Ordering::SeqCst);
            self.drain_until_quiet(high_water, report).await?;

            if !self.rerun_requested.load(Ordering::SeqCst) {
                return Ok(());
            }
            // A folded trigger may stand for a connectivity change or an
            // operator retry, so records already tried get another attempt.
            debug!("Trigger arrived during drain; rescanning the queue");
            *high_water = i64::MIN;
        }
    }

    fn publish_state(&self, next: DrainState) {
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    /// Keep scanning until no pending record above `high_water` remains.
    ///
    /// Records that failed retryably during this scan sit at or below the
    /// high-water mark and wait for the next trigger.
    async fn drain_until_quiet(
        &self,
        high_water: &mut i64,
        report: &mut DrainReport,
    ) -> Result<()> {
        loop {
            let mark = *high_water;
            let batch: Vec<MutationRecord> = self
                .queue
                .list_pending()
                .await?
                .into_iter()
                .filter(|record| record.local_id > mark)
                .collect();

            if batch.is_empty() {
                return Ok(());
            }

            report.passes = report.passes.saturating_add(1);
            debug!(count = batch.len(), pass = report.passes, "Draining pending mutations");

            for record in batch {
                *high_water = (*high_water).max(record.local_id);
                self.process_record(&record, report).await;
            }
        }
    }

    async fn process_record(&self, record: &MutationRecord, report: &mut DrainReport) {
        let local_id = record.local_id;
        report.attempted = report.attempted.saturating_add(1);

        if let Err(err) = self.queue.mark_status(local_id, MutationStatus::Syncing).await {
            warn!(local_id, error = %err, "Failed to claim mutation; leaving it pending");
            report.storage_errors = report.storage_errors.saturating_add(1);
            return;
        }

        match self.apply(record).await {
            AttemptOutcome::Applied => {
                if let Err(err) = self.queue.delete(local_id).await {
                    error!(
                        local_id,
                        error = %err,
                        "Remote apply succeeded but local delete failed; mutation will be resubmitted"
                    );
                    report.storage_errors = report.storage_errors.saturating_add(1);
                    self.release(local_id, report).await;
                } else {
                    debug!(local_id, resource = %record.resource, "Mutation applied");
                    report.applied = report.applied.saturating_add(1);
                }
            }
            AttemptOutcome::Retry(err) => {
                warn!(
                    local_id,
                    resource = %record.resource,
                    attempts = record.attempts.saturating_add(1),
                    error = %err,
                    "Remote apply failed; mutation stays pending"
                );
                report.retried = report.retried.saturating_add(1);
                self.record_failure(local_id, MutationStatus::Pending, &err, report).await;
            }
            AttemptOutcome::Rejected(err) => {
                error!(
                    local_id,
                    resource = %record.resource,
                    error = %err,
                    "Remote store rejected mutation; parked as failed"
                );
                report.rejected = report.rejected.saturating_add(1);
                self.record_failure(local_id, MutationStatus::Failed, &err, report).await;
            }
        }
    }

    async fn apply(&self, record: &MutationRecord) -> AttemptOutcome {
        let mutation = RemoteMutation::from(record);
        match tokio::time::timeout(self.apply_timeout, self.applier.apply(&mutation)).await {
            Ok(result) => AttemptOutcome::from_result(result),
            Err(_) => AttemptOutcome::Retry(RemoteApplyError::Timeout(self.apply_timeout)),
        }
    }

    async fn record_failure(
        &self,
        local_id: i64,
        status: MutationStatus,
        err: &RemoteApplyError,
        report: &mut DrainReport,
    ) {
        if let Err(store_err) = self.queue.record_failure(local_id, status, &err.to_string()).await
        {
            warn!(local_id, error = %store_err, "Failed to record apply failure");
            report.storage_errors = report.storage_errors.saturating_add(1);
            self.release(local_id, report).await;
        }
    }

    /// Best effort: never leave a record stuck in `Syncing`.
    async fn release(&self, local_id: i64, report: &mut DrainReport) {
        if let Err(err) = self.queue.mark_status(local_id, MutationStatus::Pending).await {
            warn!(local_id, error = %err, "Mutation left syncing until next startup recovery");
            report.storage_errors = report.storage_errors.saturating_add(1);
        }
    }

    async fn refresh_reporter(&self) {
        if let Err(err) = self.reporter.refresh().await {
            warn!(error = %err, "Failed to refresh queue state after drain");
        }
    }

    /// Explicitly re-enqueue a failed record. Returns `false` when the record
    /// is missing or not failed.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self, local_id: i64) -> Result<bool> {
        let retried = match self.queue.get(local_id).await? {
            Some(record) if record.status == MutationStatus::Failed => {
                self.queue.mark_status(local_id, MutationStatus::Pending).await?;
                info!(local_id, "Failed mutation re-enqueued by operator");
                true
            }
            _ => false,
        };
        self.refresh_reporter().await;
        Ok(retried)
    }

    /// Re-enqueue every failed record.
    #[instrument(skip(self))]
    pub async fn retry_all_failed(&self) -> Result<usize> {
        let failed = self.queue.list_failed().await?;
        for record in &failed {
            self.queue.mark_status(record.local_id, MutationStatus::Pending).await?;
        }
        if !failed.is_empty() {
            info!(count = failed.len(), "Failed mutations re-enqueued by operator");
        }
        self.refresh_reporter().await;
        Ok(failed.len())
    }

    /// Drop a failed record for good. Returns `false` when the record is
    /// missing or not failed.
    #[instrument(skip(self))]
    pub async fn discard(&self, local_id: i64) -> Result<bool> {
        let discarded = match self.queue.get(local_id).await? {
            Some(record) if record.status == MutationStatus::Failed => {
                self.queue.delete(local_id).await?;
                warn!(
                    local_id,
                    resource = %record.resource,
                    "Failed mutation discarded by operator"
                );
                true
            }
            _ => false,
        };
        self.refresh_reporter().await;
        Ok(discarded)
    }

    pub async fn failed_records(&self) -> Result<Vec<MutationRecord>> {
        self.queue.list_failed().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use shopsync_domain::{NewMutation, Payload, QueueState};
    use tokio::sync::Mutex as TokioMutex;

    use super::*;
    use crate::sync::memory::MemoryMutationQueue;

    type ResponseQueue = TokioMutex<Vec<std::result::Result<(), RemoteApplyError>>>;

    struct MockApplier {
        responses: ResponseQueue,
        calls: TokioMutex<Vec<String>>,
    }

    impl MockApplier {
        fn new(responses: Vec<std::result::Result<(), RemoteApplyError>>) -> Self {
            Self { responses: TokioMutex::new(responses), calls: TokioMutex::new(Vec::new()) }
        }

        async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl RemoteApplier for MockApplier {
        async fn apply(
            &self,
            mutation: &RemoteMutation<'_>,
        ) -> std::result::Result<(), RemoteApplyError> {
            let name = mutation.payload.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            self.calls.lock().await.push(name.to_string());
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                Ok(())
            } else {
                responses.remove(0)
            }
        }
    }

    fn named(name: &str) -> NewMutation {
        let payload: Payload = json!({ "name": name }).as_object().cloned().unwrap();
        NewMutation::insert("ticket", payload)
    }

    fn worker_with(
        queue: &Arc<MemoryMutationQueue>,
        applier: &Arc<MockApplier>,
    ) -> SyncDrainWorker {
        let reporter = Arc::new(QueueStateReporter::new(queue.clone()));
        SyncDrainWorker::new(queue.clone(), applier.clone(), reporter, Duration::from_secs(1))
    }

    #[test]
    fn attempt_outcome_classification() {
        assert_eq!(AttemptOutcome::from_result(Ok(())), AttemptOutcome::Applied);
        assert!(matches!(
            AttemptOutcome::from_result(Err(RemoteApplyError::Server("503".into()))),
            AttemptOutcome::Retry(_)
        ));
        assert!(matches!(
            AttemptOutcome::from_result(Err(RemoteApplyError::Client("422".into()))),
            AttemptOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn drains_in_local_id_order() {
        let queue = Arc::new(MemoryMutationQueue::new());
        for name in ["a", "b", "c"] {
            queue.enqueue(named(name)).await.unwrap();
        }
        let applier = Arc::new(MockApplier::new(vec![]));
        let worker = worker_with(&queue, &applier);

        let outcome = worker.trigger().await.unwrap();

        let report = outcome.report().copied().unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(report.passes, 1);
        assert_eq!(applier.calls().await, vec!["a", "b", "c"]);
        assert!(queue.snapshot().await.is_empty());
        assert_eq!(worker.state(), DrainState::Idle);
    }

    #[tokio::test]
    async fn retryable_failure_reverts_to_pending_without_blocking() {
        let queue = Arc::new(MemoryMutationQueue::new());
        let first = queue.enqueue(named("first")).await.unwrap();
        queue.enqueue(named("second")).await.unwrap();
        let applier =
            Arc::new(MockApplier::new(vec![Err(RemoteApplyError::Network("offline".into()))]));
        let worker = worker_with(&queue, &applier);

        let report = worker.trigger().await.unwrap().report().copied().unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(applier.calls().await, vec!["first", "second"]);

        let remaining = queue.snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].local_id, first.local_id);
        assert_eq!(remaining[0].status, MutationStatus::Pending);
        assert_eq!(remaining[0].attempts, 1);
        assert!(remaining[0].last_error.as_deref().unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn permanent_failure_parks_record_as_failed() {
        let queue = Arc::new(MemoryMutationQueue::new());
        let rejected = queue.enqueue(named("bad")).await.unwrap();
        let applier = Arc::new(MockApplier::new(vec![Err(RemoteApplyError::Client(
            "column does not exist".into(),
        ))]));
        let worker = worker_with(&queue, &applier);

        worker.trigger().await.unwrap();
        worker.trigger().await.unwrap();

        // Never retried automatically.
        assert_eq!(applier.calls().await.len(), 1);
        let failed = worker.failed_records().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].local_id, rejected.local_id);
        assert_eq!(
            queue.counts().await.unwrap(),
            QueueState { pending: 0, syncing: 0, failed: 1 }
        );
    }

    #[tokio::test]
    async fn operator_retry_and_discard_only_touch_failed_records() {
        let queue = Arc::new(MemoryMutationQueue::new());
        let a = queue.enqueue(named("a")).await.unwrap();
        let b = queue.enqueue(named("b")).await.unwrap();
        let pending = queue.enqueue(named("c")).await.unwrap();
        queue.mark_status(a.local_id, MutationStatus::Failed).await.unwrap();
        queue.mark_status(b.local_id, MutationStatus::Failed).await.unwrap();
        let applier = Arc::new(MockApplier::new(vec![]));
        let worker = worker_with(&queue, &applier);

        assert!(!worker.retry_failed(pending.local_id).await.unwrap());
        assert!(!worker.discard(pending.local_id).await.unwrap());
        assert!(!worker.retry_failed(999).await.unwrap());

        assert!(worker.retry_failed(a.local_id).await.unwrap());
        assert!(worker.discard(b.local_id).await.unwrap());

        assert_eq!(
            queue.counts().await.unwrap(),
            QueueState { pending: 2, syncing: 0, failed: 0 }
        );
    }

    #[tokio::test]
    async fn timeout_counts_as_retryable_failure() {
        struct SlowApplier;

        #[async_trait]
        impl RemoteApplier for SlowApplier {
            async fn apply(
                &self,
                _mutation: &RemoteMutation<'_>,
            ) -> std::result::Result<(), RemoteApplyError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let queue = Arc::new(MemoryMutationQueue::new());
        queue.enqueue(named("slow")).await.unwrap();
        let reporter = Arc::new(QueueStateReporter::new(queue.clone()));
        let worker = SyncDrainWorker::new(
            queue.clone(),
            Arc::new(SlowApplier),
            reporter,
            Duration::from_millis(20),
        );

        let report = worker.trigger().await.unwrap().report().copied().unwrap();

        assert_eq!(report.retried, 1);
        let records = queue.snapshot().await;
        assert_eq!(records[0].status, MutationStatus::Pending);
        assert!(records[0].last_error.as_deref().unwrap().contains("Timeout"));
    }
}
