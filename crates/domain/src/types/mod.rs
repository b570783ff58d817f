//! Domain types and models

pub mod mutation;
pub mod queue;

pub use mutation::{
    generate_idempotency_key, truncate_reason, MutationAction, MutationRecord, MutationStatus,
    NewMutation, Payload,
};
pub use queue::{DrainState, QueueState};
