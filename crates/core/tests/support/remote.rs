//! Scripted `RemoteApplier` for scenario tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shopsync_core::{RemoteApplier, RemoteApplyError, RemoteMutation};
use shopsync_domain::MutationAction;
use tokio::sync::{Mutex, Notify};

/// One observed apply call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCall {
    pub action: MutationAction,
    pub resource: String,
    pub customer: Option<String>,
    pub idempotency_key: String,
}

/// Remote store stand-in that answers from a script.
///
/// Responses are consumed in call order; once the script runs out every
/// call succeeds. An optional hold makes each call wait until released.
#[derive(Default)]
pub struct ScriptedApplier {
    script: Mutex<VecDeque<Result<(), RemoteApplyError>>>,
    calls: Mutex<Vec<AppliedCall>>,
    hold: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl ScriptedApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<(), RemoteApplyError>>) -> Self {
        Self { script: Mutex::new(script.into()), ..Self::default() }
    }

    /// Every call blocks until `release` is notified once per call.
    pub fn held(release: Arc<Notify>) -> Self {
        Self { hold: Some(release), ..Self::default() }
    }

    /// Notified each time a call starts.
    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub async fn push(&self, response: Result<(), RemoteApplyError>) {
        self.script.lock().await.push_back(response);
    }

    pub async fn calls(&self) -> Vec<AppliedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn customers(&self) -> Vec<String> {
        self.calls().await.into_iter().filter_map(|call| call.customer).collect()
    }
}

#[async_trait]
impl RemoteApplier for ScriptedApplier {
    async fn apply(&self, mutation: &RemoteMutation<'_>) -> Result<(), RemoteApplyError> {
        self.calls.lock().await.push(AppliedCall {
            action: mutation.action,
            resource: mutation.resource.to_string(),
            customer: mutation
                .payload
                .get("customer")
                .and_then(|value| value.as_str())
                .map(str::to_string),
            idempotency_key: mutation.idempotency_key.to_string(),
        });
        self.entered.notify_one();

        if let Some(release) = &self.hold {
            release.notified().await;
        }

        self.script.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
