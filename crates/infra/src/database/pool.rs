//! SQLite connection pool
//!
//! r2d2 pool over `r2d2_sqlite`, with per-connection pragmas applied as each
//! connection is opened. `synchronous=FULL` makes every committed write
//! durable before the call returns.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use shopsync_domain::constants::DEFAULT_DB_POOL_SIZE;
use shopsync_domain::{Result, ShopSyncError};
use tracing::{instrument, warn};

/// Pool of SQLite connections.
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`SqlitePool`].
pub type SqliteConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool tuning.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
    pub enable_wal: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_DB_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
        }
    }
}

/// Open (creating if needed) the database at `path` behind a pool.
#[instrument(skip(path, config), fields(db_path = ?path.as_ref(), pool_size = config.max_size))]
pub fn create_pool<P: AsRef<Path>>(path: P, config: &PoolConfig) -> Result<SqlitePool> {
    let init_config = config.clone();
    let manager = SqliteConnectionManager::file(path.as_ref())
        .with_init(move |conn| apply_connection_pragmas(conn, &init_config));

    Pool::builder()
        .max_size(config.max_size.max(1))
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            ShopSyncError::Database(format!("failed to create pool: {e}"))
        })
}

/// Apply connection-level pragmas:
/// - WAL journal for concurrent readers during a drain
/// - FULL synchronous so a crash right after a write keeps it
/// - foreign key enforcement
/// - busy timeout for lock contention between pooled connections
pub fn apply_connection_pragmas(conn: &Connection, config: &PoolConfig) -> rusqlite::Result<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }
    pragma_sql.push_str("PRAGMA synchronous=FULL;\n");
    pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");

    conn.execute_batch(&pragma_sql)?;
    conn.busy_timeout(config.busy_timeout)?;

    Ok(())
}
