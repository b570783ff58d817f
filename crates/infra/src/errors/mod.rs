//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{classify_http_error, classify_status, InfraError};
