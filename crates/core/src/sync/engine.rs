//! Sync engine
//!
//! Application-facing facade over the queue, the drain worker, the
//! connectivity monitor and the state reporter. Owns the background task
//! that drains on app start, on every offline→online transition and when a
//! mutation is enqueued while online.

use std::sync::Arc;
use std::time::Duration;

use shopsync_domain::constants::{DEFAULT_APPLY_TIMEOUT_SECS, DEFAULT_JOIN_TIMEOUT_SECS};
use shopsync_domain::{
    DrainState, MutationAction, MutationRecord, NewMutation, Payload, QueueState, Result,
    ShopSyncError, SyncConfig,
};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::connectivity::ConnectivityMonitor;
use super::drain::{DrainOutcome, SyncDrainWorker};
use super::ports::{MutationQueue, RemoteApplier};
use super::reporter::QueueStateReporter;

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct SyncEngineConfig {
    /// Upper bound for a single remote apply call.
    pub apply_timeout: Duration,
    /// How long `stop()` waits for the background task.
    pub join_timeout: Duration,
    /// Connectivity state assumed before the first observation.
    pub start_online: bool,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            apply_timeout: Duration::from_secs(DEFAULT_APPLY_TIMEOUT_SECS),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
            start_online: false,
        }
    }
}

impl From<&SyncConfig> for SyncEngineConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            apply_timeout: config.apply_timeout(),
            join_timeout: config.join_timeout(),
            start_online: config.start_online,
        }
    }
}

/// Offline mutation queue plus the machinery that reconciles it.
pub struct SyncEngine {
    queue: Arc<dyn MutationQueue>,
    worker: Arc<SyncDrainWorker>,
    reporter: Arc<QueueStateReporter>,
    monitor: Arc<ConnectivityMonitor>,
    wake: Arc<Notify>,
    config: SyncEngineConfig,
    cancellation_token: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<dyn MutationQueue>,
        applier: Arc<dyn RemoteApplier>,
        config: SyncEngineConfig,
    ) -> Self {
        let reporter = Arc::new(QueueStateReporter::new(Arc::clone(&queue)));
        let worker = Arc::new(SyncDrainWorker::new(
            Arc::clone(&queue),
            applier,
            Arc::clone(&reporter),
            config.apply_timeout,
        ));

        Self {
            queue,
            worker,
            reporter,
            monitor: Arc::new(ConnectivityMonitor::new(config.start_online)),
            wake: Arc::new(Notify::new()),
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Mutex::new(None),
        }
    }

    /// Record a change for eventual delivery. Never touches the network.
    ///
    /// # Errors
    /// `InvalidInput` when the mutation is malformed; `Database` when the
    /// local queue cannot persist it. Either way nothing was queued.
    #[instrument(skip(self, payload), fields(action = %action))]
    pub async fn enqueue(
        &self,
        action: MutationAction,
        resource: &str,
        payload: Payload,
    ) -> Result<i64> {
        let record = self.queue.enqueue(NewMutation::new(action, resource, payload)).await?;
        debug!(local_id = record.local_id, resource = %record.resource, "Mutation queued");

        if let Err(err) = self.reporter.refresh().await {
            warn!(error = %err, "Failed to refresh queue state after enqueue");
        }
        if self.monitor.is_online() {
            self.wake.notify_one();
        }

        Ok(record.local_id)
    }

    /// Drain now unless a drain is already running.
    pub async fn trigger_drain(&self) -> Result<DrainOutcome> {
        self.worker.trigger().await
    }

    /// Counts recomputed from the queue.
    pub async fn queue_state(&self) -> Result<QueueState> {
        self.reporter.refresh().await
    }

    pub fn subscribe_queue_state(&self) -> watch::Receiver<QueueState> {
        self.reporter.subscribe()
    }

    /// Feed a reachability observation; returns `true` on a transition.
    pub fn report_connectivity(&self, online: bool) -> bool {
        self.monitor.report(online)
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn connectivity(&self) -> Arc<ConnectivityMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn drain_state(&self) -> DrainState {
        self.worker.state()
    }

    pub fn subscribe_drain_state(&self) -> watch::Receiver<DrainState> {
        self.worker.subscribe_state()
    }

    pub async fn retry_failed(&self, local_id: i64) -> Result<bool> {
        let retried = self.worker.retry_failed(local_id).await?;
        if retried && self.monitor.is_online() {
            self.wake.notify_one();
        }
        Ok(retried)
    }

    pub async fn retry_all_failed(&self) -> Result<usize> {
        let retried = self.worker.retry_all_failed().await?;
        if retried > 0 && self.monitor.is_online() {
            self.wake.notify_one();
        }
        Ok(retried)
    }

    pub async fn discard(&self, local_id: i64) -> Result<bool> {
        self.worker.discard(local_id).await
    }

    pub async fn failed_records(&self) -> Result<Vec<MutationRecord>> {
        self.worker.failed_records().await
    }

    /// App-start reconciliation: records a crash left mid-flight go back to
    /// pending so they are resubmitted.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let requeued = self.queue.requeue_in_flight().await?;
        if requeued > 0 {
            warn!(requeued, "Recovered mutations left in flight by a previous run");
        }
        self.reporter.refresh().await?;
        Ok(requeued)
    }

    /// Run startup recovery and spawn the background drain loop. The loop
    /// drains once immediately when already online.
    ///
    /// # Errors
    /// `Internal` if already running; storage errors from recovery.
    pub async fn start(&self) -> Result<()> {
        let mut handle_guard = self.task_handle.lock().await;
        if handle_guard.is_some() {
            return Err(ShopSyncError::Internal("Sync engine already running".to_string()));
        }
        if self.cancellation_token.is_cancelled() {
            return Err(ShopSyncError::Internal("Sync engine has been stopped".to_string()));
        }

        self.recover().await?;

        let worker = Arc::clone(&self.worker);
        let monitor = Arc::clone(&self.monitor);
        let wake = Arc::clone(&self.wake);
        let mut events = self.monitor.subscribe();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            info!("Sync engine started");
            if monitor.is_online() {
                run_drain(&worker, "startup").await;
            }

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("Sync engine cancelled");
                        break;
                    }
                    event = events.next_online() => {
                        if event.is_none() {
                            debug!("Connectivity monitor dropped; stopping sync loop");
                            break;
                        }
                        run_drain(&worker, "connectivity").await;
                    }
                    () = wake.notified() => {
                        run_drain(&worker, "enqueue").await;
                    }
                }
            }
        });

        *handle_guard = Some(handle);
        Ok(())
    }

    /// Cancel the background loop and wait for it to finish.
    pub async fn stop(&self) -> Result<()> {
        self.cancellation_token.cancel();

        let handle = self.task_handle.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {
                    info!("Sync engine stopped");
                    Ok(())
                }
                Ok(Err(err)) => Err(ShopSyncError::Internal(format!(
                    "Sync engine task failed: {err}"
                ))),
                Err(_) => Err(ShopSyncError::Internal(format!(
                    "Sync engine did not stop within {:?}",
                    self.config.join_timeout
                ))),
            }
        } else {
            Ok(())
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.try_lock().map(|guard| guard.is_some()).unwrap_or(true)
            && !self.cancellation_token.is_cancelled()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

async fn run_drain(worker: &SyncDrainWorker, reason: &'static str) {
    match worker.trigger().await {
        Ok(DrainOutcome::Completed(report)) => {
            debug!(reason, applied = report.applied, attempted = report.attempted, "Drain finished");
        }
        Ok(DrainOutcome::AlreadyRunning) => {
            debug!(reason, "Drain already running");
        }
        Err(err) => {
            error!(reason, error = %err, "Drain failed");
        }
    }
}
