//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ShopSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ShopSyncError {
    /// Local storage failure. Fatal to the calling write path.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutation was rejected before it reached the queue.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopSyncError {
    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for ShopSync operations
pub type Result<T> = std::result::Result<T, ShopSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = ShopSyncError::Database("disk full".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Database");
        assert_eq!(json["message"], "disk full");
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ShopSyncError::InvalidInput("x".into()).label(), "invalid_input");
        assert_eq!(ShopSyncError::Database("x".into()).label(), "database");
    }
}
