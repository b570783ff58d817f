//! # ShopSync App
//!
//! Application layer - wiring and the `shopsync` binary.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Logging initialisation
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod utils;

pub use context::*;
