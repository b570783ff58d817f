//! Shared fixtures for `shopsync-app` integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use shopsync_domain::{
    Config, DatabaseConfig, LoggingConfig, Payload, RemoteConfig, SyncConfig,
};
use tempfile::TempDir;

/// Scratch directory holding the queue database for one test.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("failed to create temporary directory") }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("shopsync.db")
    }

    /// Configuration pointing at `remote_url`, starting offline.
    pub fn config(&self, remote_url: &str) -> Config {
        Config {
            database: DatabaseConfig {
                path: self.db_path().to_string_lossy().into_owned(),
                pool_size: 2,
            },
            remote: RemoteConfig {
                base_url: remote_url.to_string(),
                api_key: Some("anon-key".into()),
                timeout_secs: 2,
            },
            sync: SyncConfig { apply_timeout_secs: 2, join_timeout_secs: 2, start_online: false },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ticket(customer: &str) -> Payload {
    json!({ "customer": customer, "device": "iPhone 12", "issue": "battery" })
        .as_object()
        .cloned()
        .expect("ticket payload is an object")
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
