//! # ShopSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite-backed durable mutation queue (r2d2 pool)
//! - Configuration loading (environment, JSON, TOML)
//! - PostgREST HTTP remote applier and reachability probe
//! - Conversions from driver errors into domain errors
//! - PID-file ownership lock for the queue database
//!
//! ## Architecture
//! - Implements traits defined in `shopsync-core`
//! - Contains all "impure" code (I/O, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod instance_lock;
pub mod remote;

// Re-export commonly used items
pub use database::{DbManager, SqliteMutationQueue};
pub use errors::InfraError;
pub use instance_lock::QueueLock;
pub use remote::{PostgrestApplier, PostgrestConfig, ReachabilityProbe};
