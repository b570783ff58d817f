//! Connectivity monitor
//!
//! Holds the best-effort reachability flag and turns raw observations into
//! offline→online edges. Observations that do not change the state are
//! dropped, so subscribers see exactly one event per transition.

use tokio::sync::watch;
use tracing::{info, trace};

/// Current reachability plus transition notifications.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    /// Feed a reachability observation. Returns `true` when it changed state.
    pub fn report(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
        } else {
            trace!(online, "Duplicate connectivity signal suppressed");
        }

        changed
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Listen for future offline→online transitions.
    pub fn subscribe(&self) -> ConnectivityEvents {
        ConnectivityEvents { rx: self.tx.subscribe() }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Stream of offline→online transitions.
#[derive(Debug)]
pub struct ConnectivityEvents {
    rx: watch::Receiver<bool>,
}

impl ConnectivityEvents {
    /// Wait for the next transition to online.
    ///
    /// Returns `None` once the monitor has been dropped. Cancel safe.
    pub async fn next_online(&mut self) -> Option<()> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if *self.rx.borrow_and_update() {
                return Some(());
            }
        }
    }
}
