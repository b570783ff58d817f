//! Remote apply error types
//!
//! Every failed apply attempt is classified so the drain worker can decide
//! mechanically between "revert to pending" and "park as failed".

use std::time::Duration;

use shopsync_domain::ShopSyncError;
use thiserror::Error;

/// Categories of remote apply errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorCategory {
    /// Authentication errors (401, 403) - retry after credentials refresh
    Authentication,
    /// Rate limiting errors (429) - retryable
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - permanent rejection
    Client,
    /// Network/connection errors and timeouts - retryable
    Network,
    /// Configuration errors - permanent until an operator intervenes
    Config,
}

/// Failure of a single remote apply attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteApplyError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Remote rejected mutation: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl RemoteApplyError {
    /// Get the error category for this error
    pub fn category(&self) -> RemoteErrorCategory {
        match self {
            Self::Auth(_) => RemoteErrorCategory::Authentication,
            Self::RateLimit(_) => RemoteErrorCategory::RateLimit,
            Self::Server(_) => RemoteErrorCategory::Server,
            Self::Client(_) => RemoteErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => RemoteErrorCategory::Network,
            Self::Config(_) => RemoteErrorCategory::Config,
        }
    }

    /// Whether the mutation should stay pending for the next drain.
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            RemoteErrorCategory::Authentication
                | RemoteErrorCategory::RateLimit
                | RemoteErrorCategory::Server
                | RemoteErrorCategory::Network
        )
    }
}

/// Convert from ShopSyncError to RemoteApplyError
impl From<ShopSyncError> for RemoteApplyError {
    fn from(err: ShopSyncError) -> Self {
        match err {
            ShopSyncError::Network(message) => Self::Network(message),
            ShopSyncError::Config(message) => Self::Config(message),
            ShopSyncError::InvalidInput(message) | ShopSyncError::NotFound(message) => {
                Self::Client(message)
            }
            ShopSyncError::Database(message) | ShopSyncError::Internal(message) => {
                Self::Server(message)
            }
        }
    }
}
