//! Reachability probe
//!
//! Connectivity signal source: asks the remote store whether it answers and
//! reports the result to the [`ConnectivityMonitor`]. Any HTTP answer counts
//! as reachable; only transport failures count as offline.

use std::sync::Arc;
use std::time::Duration;

use shopsync_core::ConnectivityMonitor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::postgrest::PostgrestApplier;

/// Feeds remote reachability into a connectivity monitor.
pub struct ReachabilityProbe {
    applier: Arc<PostgrestApplier>,
    monitor: Arc<ConnectivityMonitor>,
}

impl ReachabilityProbe {
    pub fn new(applier: Arc<PostgrestApplier>, monitor: Arc<ConnectivityMonitor>) -> Self {
        Self { applier, monitor }
    }

    /// Probe once and report. Returns the observed reachability.
    pub async fn probe_now(&self) -> bool {
        let online = match self.applier.health_check().await {
            Ok(healthy) => {
                debug!(healthy, "Remote store answered reachability probe");
                true
            }
            Err(err) => {
                debug!(error = %err, "Remote store unreachable");
                false
            }
        };
        self.monitor.report(online);
        online
    }

    /// Probe every `every` until cancelled.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        loop {
            self.probe_now().await;
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Reachability probe cancelled");
                    break;
                }
                () = tokio::time::sleep(every) => {}
            }
        }
    }
}
