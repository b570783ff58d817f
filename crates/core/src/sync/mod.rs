//! Offline mutation sync
//!
//! Ports for the local queue and the remote store, plus the drain worker,
//! connectivity monitor, state reporter and the engine facade that ties them
//! together.

pub mod connectivity;
pub mod drain;
pub mod engine;
pub mod errors;
pub mod memory;
pub mod ports;
pub mod reporter;

pub use connectivity::{ConnectivityEvents, ConnectivityMonitor};
pub use drain::{AttemptOutcome, DrainOutcome, DrainReport, SyncDrainWorker};
pub use engine::{SyncEngine, SyncEngineConfig};
pub use errors::{RemoteApplyError, RemoteErrorCategory};
pub use memory::MemoryMutationQueue;
pub use ports::{MutationQueue, RemoteApplier, RemoteMutation};
pub use reporter::QueueStateReporter;
