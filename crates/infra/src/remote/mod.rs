//! Remote store adapters
//!
//! HTTP implementation of the `RemoteApplier` port for a PostgREST-style
//! endpoint, and the reachability probe that feeds the connectivity monitor.

pub mod postgrest;
pub mod probe;

pub use postgrest::{PostgrestApplier, PostgrestConfig};
pub use probe::ReachabilityProbe;
