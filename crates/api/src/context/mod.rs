//! Application context - dependency injection container

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shopsync_core::{MutationQueue, RemoteApplier, SyncEngine, SyncEngineConfig};
use shopsync_domain::{Config, Result, ShopSyncError};
use shopsync_infra::{DbManager, PostgrestApplier, QueueLock, ReachabilityProbe, SqliteMutationQueue};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Type alias for the mutation queue port trait object
type DynMutationQueue = dyn MutationQueue + 'static;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub queue: Arc<DynMutationQueue>,
    pub applier: Arc<PostgrestApplier>,
    pub engine: Arc<SyncEngine>,
    pub probe: Arc<ReachabilityProbe>,
    probe_cancel: CancellationToken,
    probe_handle: Mutex<Option<JoinHandle<()>>>,
    _queue_lock: QueueLock,
}

impl AppContext {
    /// Wire storage, the remote client and the engine from `config`.
    ///
    /// Nothing runs in the background until [`AppContext::start`].
    ///
    /// # Errors
    /// `Database` when the queue is owned by another process or cannot be
    /// opened; `Config` when the remote endpoint is unusable.
    pub async fn new(config: Config) -> Result<Self> {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                ShopSyncError::Internal(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let queue_lock = QueueLock::acquire(db_path)?;

        let db = Arc::new(DbManager::new(db_path, config.database.pool_size)?);
        db.run_migrations()?;

        let queue: Arc<DynMutationQueue> = Arc::new(SqliteMutationQueue::new(Arc::clone(&db)));
        let applier = Arc::new(PostgrestApplier::from_config(&config.remote)?);
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&queue),
            Arc::clone(&applier) as Arc<dyn RemoteApplier>,
            SyncEngineConfig::from(&config.sync),
        ));
        let probe = Arc::new(ReachabilityProbe::new(Arc::clone(&applier), engine.connectivity()));

        info!(
            db_path = %db.path().display(),
            remote = %applier.config().base_url,
            start_online = config.sync.start_online,
            "application context initialised"
        );

        Ok(Self {
            config,
            db,
            queue,
            applier,
            engine,
            probe,
            probe_cancel: CancellationToken::new(),
            probe_handle: Mutex::new(None),
            _queue_lock: queue_lock,
        })
    }

    /// Start the sync engine and the reachability probe loop.
    pub async fn start(&self, probe_every: Duration) -> Result<()> {
        self.engine.start().await?;

        let mut guard = self.probe_handle.lock().await;
        if guard.is_none() {
            let probe = Arc::clone(&self.probe);
            let cancel = self.probe_cancel.clone();
            *guard = Some(tokio::spawn(async move { probe.run(probe_every, cancel).await }));
        }
        Ok(())
    }

    /// Stop the probe loop, then the engine. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        self.probe_cancel.cancel();
        if let Some(handle) = self.probe_handle.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "reachability probe task ended abnormally");
            }
        }

        self.engine.stop().await
    }
}
