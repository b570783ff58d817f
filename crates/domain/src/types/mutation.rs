//! Mutation record types
//!
//! A mutation is one deferred remote write. Callers build a [`NewMutation`];
//! the durable queue turns it into a [`MutationRecord`] by assigning the
//! `local_id`, the idempotency key and the enqueue timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::PRIMARY_KEY_FIELD;
use crate::errors::{Result, ShopSyncError};

/// Field name → value mapping sent to the remote store.
pub type Payload = Map<String, Value>;

/// Kind of remote write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    /// Create a new remote resource.
    Insert,
    /// Mutate the resource identified by the payload's `id`.
    Update,
}

crate::impl_domain_status_conversions!(MutationAction {
    Insert => "insert",
    Update => "update"
});

/// Queue status of a mutation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Eligible for the next drain.
    Pending,
    /// Claimed by the in-flight drain pass.
    Syncing,
    /// Rejected permanently; waits for an operator.
    Failed,
}

crate::impl_domain_status_conversions!(MutationStatus {
    Pending => "pending",
    Syncing => "syncing",
    Failed => "failed"
});

/// Caller-supplied mutation before it has been queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMutation {
    pub action: MutationAction,
    pub resource: String,
    pub payload: Payload,
}

impl NewMutation {
    pub fn new(action: MutationAction, resource: impl Into<String>, payload: Payload) -> Self {
        Self { action, resource: resource.into(), payload }
    }

    /// Shorthand for an insert mutation.
    pub fn insert(resource: impl Into<String>, payload: Payload) -> Self {
        Self::new(MutationAction::Insert, resource, payload)
    }

    /// Shorthand for an update mutation.
    pub fn update(resource: impl Into<String>, payload: Payload) -> Self {
        Self::new(MutationAction::Update, resource, payload)
    }

    /// Check the mutation can ever be applied.
    ///
    /// # Errors
    /// Returns [`ShopSyncError::InvalidInput`] when the resource name is
    /// blank, or when an update carries no usable primary key.
    pub fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(ShopSyncError::InvalidInput("mutation resource must not be empty".into()));
        }

        if self.action == MutationAction::Update {
            match self.payload.get(PRIMARY_KEY_FIELD) {
                Some(Value::String(id)) if !id.trim().is_empty() => {}
                Some(Value::Number(_)) => {}
                Some(Value::Null) | None => {
                    return Err(ShopSyncError::InvalidInput(format!(
                        "update on '{}' requires a '{PRIMARY_KEY_FIELD}' field",
                        self.resource
                    )));
                }
                Some(other) => {
                    return Err(ShopSyncError::InvalidInput(format!(
                        "update on '{}' has an unusable '{PRIMARY_KEY_FIELD}': {other}",
                        self.resource
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A queued mutation as stored in the local durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Monotonic queue position; never reused.
    pub local_id: i64,
    pub action: MutationAction,
    pub resource: String,
    pub payload: Payload,
    pub status: MutationStatus,
    pub created_at: DateTime<Utc>,
    /// Sent with every attempt so the remote side can deduplicate.
    pub idempotency_key: String,
    /// Failed apply attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl MutationRecord {
    /// Build a fresh pending record for `mutation` at position `local_id`.
    pub fn pending(local_id: i64, mutation: NewMutation, created_at: DateTime<Utc>) -> Self {
        Self::pending_with_key(local_id, mutation, created_at, generate_idempotency_key())
    }

    /// Same as [`MutationRecord::pending`] for a key that was already
    /// persisted alongside the row.
    pub fn pending_with_key(
        local_id: i64,
        mutation: NewMutation,
        created_at: DateTime<Utc>,
        idempotency_key: String,
    ) -> Self {
        Self {
            local_id,
            action: mutation.action,
            resource: mutation.resource,
            payload: mutation.payload,
            status: MutationStatus::Pending,
            created_at,
            idempotency_key,
            attempts: 0,
            last_error: None,
        }
    }

    /// Remote primary key for updates.
    pub fn primary_key(&self) -> Option<&Value> {
        self.payload.get(PRIMARY_KEY_FIELD).filter(|value| !value.is_null())
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }
}

/// Client-generated idempotency token (UUIDv7, time ordered).
pub fn generate_idempotency_key() -> String {
    Uuid::now_v7().to_string()
}

/// Truncate a failure reason to `max_len` characters, marking the cut.
pub fn truncate_reason(reason: &str, max_len: usize) -> String {
    if reason.chars().count() <= max_len {
        return reason.to_string();
    }

    let mut truncated = reason.chars().take(max_len.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
