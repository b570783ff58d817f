//! Shared fixtures for `shopsync-infra` integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use shopsync_domain::Payload;
use shopsync_infra::database::{DbManager, SqliteMutationQueue};
use tempfile::TempDir;

/// Temporary database directory that outlives individual managers, so a test
/// can close the database and open it again.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let path = temp_dir.path().join("queue.db");
        let manager = open_manager(&path);

        Self { manager, path, _temp_dir: temp_dir }
    }

    pub fn queue(&self) -> SqliteMutationQueue {
        SqliteMutationQueue::new(Arc::clone(&self.manager))
    }

    /// Drop the current pool and open a fresh one on the same file,
    /// simulating an application restart.
    pub fn reopen(&mut self) {
        self.manager = open_manager(&self.path);
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn open_manager(path: &PathBuf) -> Arc<DbManager> {
    let manager = DbManager::new(path, 2).expect("db manager should be created");
    manager.run_migrations().expect("migrations should run");
    Arc::new(manager)
}

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be a JSON object")
}

pub fn ticket(customer: &str) -> Payload {
    payload(json!({ "customer": customer, "device": "Pixel 7", "issue": "cracked screen" }))
}
