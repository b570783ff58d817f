//! Database implementations

pub mod manager;
pub mod mutation_queue_repository;
pub mod pool;

pub use manager::*;
pub use mutation_queue_repository::*;
pub use pool::*;
