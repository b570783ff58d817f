//! # ShopSync Domain
//!
//! Business domain types for the offline mutation queue.
//!
//! This crate contains:
//! - Mutation record types and validation
//! - Derived queue/drain state
//! - Domain error types and Result definitions
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other ShopSync crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
