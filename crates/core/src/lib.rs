//! # ShopSync Core
//!
//! Sync logic for the offline mutation queue - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (`MutationQueue`, `RemoteApplier`)
//! - The remote apply error taxonomy
//! - Connectivity monitor, drain worker and queue state reporter
//! - The `SyncEngine` facade
//!
//! ## Architecture Principles
//! - Only depends on `shopsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod sync;

pub use sync::{
    AttemptOutcome, ConnectivityEvents, ConnectivityMonitor, DrainOutcome, DrainReport,
    MemoryMutationQueue, MutationQueue, QueueStateReporter, RemoteApplier, RemoteApplyError,
    RemoteErrorCategory, RemoteMutation, SyncDrainWorker, SyncEngine, SyncEngineConfig,
};
