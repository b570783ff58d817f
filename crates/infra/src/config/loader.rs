//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SHOPSYNC_DB_PATH`: Queue database file path (required)
//! - `SHOPSYNC_REMOTE_URL`: Remote store base URL (required)
//! - `SHOPSYNC_DB_POOL_SIZE`: Connection pool size
//! - `SHOPSYNC_REMOTE_API_KEY`: API key sent as `apikey` and bearer token
//! - `SHOPSYNC_REMOTE_TIMEOUT_SECS`: HTTP client timeout in seconds
//! - `SHOPSYNC_APPLY_TIMEOUT_SECS`: Per-mutation apply timeout in seconds
//! - `SHOPSYNC_START_ONLINE`: Assume connectivity at startup (true/false)
//! - `SHOPSYNC_LOG_LEVEL`: Default log filter
//! - `SHOPSYNC_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./shopsync.json` or `./shopsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use shopsync_domain::constants::{
    DEFAULT_APPLY_TIMEOUT_SECS, DEFAULT_DB_POOL_SIZE, DEFAULT_REMOTE_TIMEOUT_SECS,
};
use shopsync_domain::{
    Config, DatabaseConfig, LoggingConfig, RemoteConfig, Result, ShopSyncError, SyncConfig,
};
use url::Url;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file. The
/// result is validated either way.
///
/// # Errors
/// Returns `ShopSyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing or invalid
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `SHOPSYNC_DB_PATH` and `SHOPSYNC_REMOTE_URL` are required; everything
/// else falls back to its default.
///
/// # Errors
/// Returns `ShopSyncError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("SHOPSYNC_DB_PATH")?;
    let base_url = env_var("SHOPSYNC_REMOTE_URL")?;

    let pool_size = env_parse("SHOPSYNC_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE)?;
    let api_key = std::env::var("SHOPSYNC_REMOTE_API_KEY").ok().filter(|key| !key.is_empty());
    let timeout_secs = env_parse("SHOPSYNC_REMOTE_TIMEOUT_SECS", DEFAULT_REMOTE_TIMEOUT_SECS)?;

    let sync = SyncConfig {
        apply_timeout_secs: env_parse("SHOPSYNC_APPLY_TIMEOUT_SECS", DEFAULT_APPLY_TIMEOUT_SECS)?,
        start_online: env_bool("SHOPSYNC_START_ONLINE", false),
        ..SyncConfig::default()
    };

    let defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: std::env::var("SHOPSYNC_LOG_LEVEL").unwrap_or(defaults.level),
        json: env_bool("SHOPSYNC_LOG_JSON", defaults.json),
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size },
        remote: RemoteConfig { base_url, api_key, timeout_secs },
        sync,
        logging,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ShopSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ShopSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ShopSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ShopSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Check values serde cannot check.
///
/// # Errors
/// Returns `ShopSyncError::Config` for an empty database path or a remote
/// URL that is not absolute http(s).
pub fn validate(config: &Config) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(ShopSyncError::Config("database.path must not be empty".to_string()));
    }

    let url = Url::parse(&config.remote.base_url).map_err(|e| {
        ShopSyncError::Config(format!("Invalid remote.base_url '{}': {}", config.remote.base_url, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ShopSyncError::Config(format!(
            "remote.base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ShopSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ShopSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(ShopSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its parent, and the executable's
/// directory for `config.{json,toml}` and `shopsync.{json,toml}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("shopsync.json"),
            cwd.join("shopsync.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("shopsync.json"),
                exe_dir.join("shopsync.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `ShopSyncError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        ShopSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional numeric environment variable, using `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ShopSyncError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 9] = [
        "SHOPSYNC_DB_PATH",
        "SHOPSYNC_REMOTE_URL",
        "SHOPSYNC_DB_POOL_SIZE",
        "SHOPSYNC_REMOTE_API_KEY",
        "SHOPSYNC_REMOTE_TIMEOUT_SECS",
        "SHOPSYNC_APPLY_TIMEOUT_SECS",
        "SHOPSYNC_START_ONLINE",
        "SHOPSYNC_LOG_LEVEL",
        "SHOPSYNC_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_SHOPSYNC_BOOL_YES", "YES");
        std::env::set_var("TEST_SHOPSYNC_BOOL_ONE", "1");
        std::env::set_var("TEST_SHOPSYNC_BOOL_OFF", "off");

        assert!(env_bool("TEST_SHOPSYNC_BOOL_YES", false));
        assert!(env_bool("TEST_SHOPSYNC_BOOL_ONE", false));
        assert!(!env_bool("TEST_SHOPSYNC_BOOL_OFF", true));

        std::env::remove_var("TEST_SHOPSYNC_BOOL_MISSING");
        assert!(env_bool("TEST_SHOPSYNC_BOOL_MISSING", true));
        assert!(!env_bool("TEST_SHOPSYNC_BOOL_MISSING", false));

        std::env::remove_var("TEST_SHOPSYNC_BOOL_YES");
        std::env::remove_var("TEST_SHOPSYNC_BOOL_ONE");
        std::env::remove_var("TEST_SHOPSYNC_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SHOPSYNC_DB_PATH", "/tmp/queue.db");
        std::env::set_var("SHOPSYNC_REMOTE_URL", "https://store.example.test");
        std::env::set_var("SHOPSYNC_DB_POOL_SIZE", "6");
        std::env::set_var("SHOPSYNC_REMOTE_API_KEY", "anon-key");
        std::env::set_var("SHOPSYNC_REMOTE_TIMEOUT_SECS", "12");
        std::env::set_var("SHOPSYNC_APPLY_TIMEOUT_SECS", "45");
        std::env::set_var("SHOPSYNC_START_ONLINE", "true");
        std::env::set_var("SHOPSYNC_LOG_LEVEL", "debug");
        std::env::set_var("SHOPSYNC_LOG_JSON", "1");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config loads from env");
        assert_eq!(config.database.path, "/tmp/queue.db");
        assert_eq!(config.database.pool_size, 6);
        assert_eq!(config.remote.base_url, "https://store.example.test");
        assert_eq!(config.remote.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.remote.timeout_secs, 12);
        assert_eq!(config.sync.apply_timeout_secs, 45);
        assert!(config.sync.start_online);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_uses_defaults_for_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SHOPSYNC_DB_PATH", "/tmp/queue.db");
        std::env::set_var("SHOPSYNC_REMOTE_URL", "http://localhost:54321");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config loads from env");
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert_eq!(config.remote.api_key, None);
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SHOPSYNC_DB_PATH", "/tmp/queue.db");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(ShopSyncError::Config(msg)) if msg.contains("SHOPSYNC_REMOTE_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SHOPSYNC_DB_PATH", "/tmp/queue.db");
        std::env::set_var("SHOPSYNC_REMOTE_URL", "http://localhost:54321");
        std::env::set_var("SHOPSYNC_DB_POOL_SIZE", "not-a-number");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(ShopSyncError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "database": { "path": "queue.db", "pool_size": 2 },
                "remote": { "base_url": "https://store.example.test", "api_key": "k" },
                "sync": { "apply_timeout_secs": 10 }
            }"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config loads from JSON");
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.sync.apply_timeout_secs, 10);
        assert!(!config.sync.start_online);
        assert_eq!(config.remote.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[database]
path = "queue.db"

[remote]
base_url = "https://store.example.test"

[logging]
level = "warn"
json = true
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config loads from TOML");
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(ShopSyncError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_missing_remote_section() {
        let path = write_temp(r#"{ "database": { "path": "queue.db" } }"#, "json");

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(result.is_err(), "remote section is required");
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config: Config = serde_json::from_str(
            r#"{
                "database": { "path": "queue.db" },
                "remote": { "base_url": "https://store.example.test" }
            }"#,
        )
        .unwrap();
        assert!(validate(&config).is_ok());

        config.remote.base_url = "ftp://store.example.test".into();
        assert!(validate(&config).is_err());

        config.remote.base_url = "not a url".into();
        assert!(validate(&config).is_err());

        config.remote.base_url = "https://store.example.test".into();
        config.database.path = "  ".into();
        assert!(validate(&config).is_err());
    }
}
