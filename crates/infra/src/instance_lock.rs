//! Queue ownership lock
//!
//! Only one process may drain a given queue database, otherwise two drains
//! could submit the same record concurrently. The owner writes its PID to
//! `<database>.pid`; a file left behind by a dead process is reclaimed.

use std::fs;
use std::path::{Path, PathBuf};

use shopsync_domain::{Result, ShopSyncError};

/// PID file guarding a queue database. Released on drop.
#[derive(Debug)]
pub struct QueueLock {
    pid_file: PathBuf,
}

impl QueueLock {
    /// Claim the queue stored at `db_path`.
    ///
    /// # Errors
    /// `Database` when a live process already owns the queue or the PID file
    /// cannot be written.
    pub fn acquire<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let pid_file = pid_file_for(db_path.as_ref());

        if let Ok(content) = fs::read_to_string(&pid_file) {
            if let Ok(pid) = content.trim().parse::<u32>() {
                if is_process_running(pid) {
                    tracing::warn!(owner_pid = pid, path = %pid_file.display(), "queue_lock.held");
                    return Err(ShopSyncError::Database(format!(
                        "Queue is owned by another running process (PID: {pid})"
                    )));
                }
                tracing::warn!(stale_pid = pid, "queue_lock.stale_pid_file");
            }
            if let Err(err) = fs::remove_file(&pid_file) {
                tracing::warn!(error = %err, path = %pid_file.display(), "queue_lock.remove_stale_failed");
            }
        }

        let current_pid = std::process::id();
        fs::write(&pid_file, current_pid.to_string())
            .map_err(|e| ShopSyncError::Database(format!("Failed to create PID file: {e}")))?;

        tracing::info!(pid = current_pid, path = %pid_file.display(), "queue_lock.acquired");
        Ok(Self { pid_file })
    }

    pub fn path(&self) -> &Path {
        &self.pid_file
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.pid_file) {
            tracing::warn!(error = %e, path = %self.pid_file.display(), "queue_lock.release_failed");
        } else {
            tracing::info!(path = %self.pid_file.display(), "queue_lock.released");
        }
    }
}

fn pid_file_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".pid");
    db_path.with_file_name(name)
}

#[cfg(target_os = "linux")]
fn is_process_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_running(pid: u32) -> bool {
    // `kill -0` probes for existence without delivering a signal.
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_process_running(pid: u32) -> bool {
    tracing::warn!(pid, "queue_lock.process_check_unsupported");
    false
}
