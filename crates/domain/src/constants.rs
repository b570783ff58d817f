//! Application constants
//!
//! Centralized location for domain-level constants shared by the engine and
//! its adapters.

/// Payload field that carries the remote primary key for updates.
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Maximum stored length of a mutation's `last_error`.
pub const MAX_ERROR_REASON_LEN: usize = 256;

// Configuration defaults
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const DEFAULT_APPLY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Cadence of the binary's reachability probe.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
