//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use r2d2::Error as PoolError;
use reqwest::{Error as HttpError, StatusCode};
use rusqlite::Error as SqlError;
use shopsync_core::RemoteApplyError;
use shopsync_domain::ShopSyncError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ShopSyncError);

impl From<InfraError> for ShopSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ShopSyncError> for InfraError {
    fn from(value: ShopSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoShopSyncError {
    fn into_shopsync(self) -> ShopSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ShopSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShopSyncError for SqlError {
    fn into_shopsync(self) -> ShopSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        ShopSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        ShopSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::DiskFull, _) => ShopSyncError::Database("disk is full".into()),
                    (ErrorCode::ReadOnly, _) => {
                        ShopSyncError::Database("database is read-only".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        ShopSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => {
                        ShopSyncError::Database("file is not a database".into())
                    }
                    _ => ShopSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ShopSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ShopSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ShopSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => ShopSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => ShopSyncError::Database("invalid SQL query".into()),
            other => ShopSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_shopsync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ShopSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShopSyncError for PoolError {
    fn into_shopsync(self) -> ShopSyncError {
        ShopSyncError::Database(format!("connection pool unavailable: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(value.into_shopsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ShopSyncError */
/* -------------------------------------------------------------------------- */

impl IntoShopSyncError for HttpError {
    fn into_shopsync(self) -> ShopSyncError {
        if self.is_timeout() {
            return ShopSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ShopSyncError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return ShopSyncError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => ShopSyncError::NotFound(message),
                400..=499 if code != 408 && code != 429 => ShopSyncError::InvalidInput(message),
                _ => ShopSyncError::Network(message),
            };
        }

        ShopSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_shopsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Remote apply classification */
/* -------------------------------------------------------------------------- */

/// Classify a transport-level failure of a remote apply call.
pub fn classify_http_error(err: &HttpError, timeout: Duration) -> RemoteApplyError {
    if err.is_timeout() {
        return RemoteApplyError::Timeout(timeout);
    }
    if err.is_connect() {
        return RemoteApplyError::Network(format!("connection failed: {err}"));
    }
    if err.is_builder() {
        return RemoteApplyError::Config(format!("invalid request: {err}"));
    }
    if let Some(status) = err.status() {
        return classify_status(status, &err.to_string(), timeout);
    }
    RemoteApplyError::Network(err.to_string())
}

/// Classify a non-success HTTP status returned by the remote store.
pub fn classify_status(status: StatusCode, body: &str, timeout: Duration) -> RemoteApplyError {
    let message = if body.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body.trim())
    };

    match status.as_u16() {
        401 | 403 => RemoteApplyError::Auth(message),
        408 => RemoteApplyError::Timeout(timeout),
        429 => RemoteApplyError::RateLimit(message),
        400..=499 => RemoteApplyError::Client(message),
        _ => RemoteApplyError::Server(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
