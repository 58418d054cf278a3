//! SQLite pool setup for the claim store.
//!
//! File databases run in WAL mode so the read API can query while a sweep
//! commits. Foreign keys are always enforced.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open claim store: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Failed to create database directory {path}: {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            ..Self::default()
        }
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, ConnectionError> {
    SqliteConnectOptions::from_str(database_url)
        .map(|options| options.foreign_keys(true))
        .map_err(|_| ConnectionError::InvalidDatabaseUrl(database_url.to_string()))
}

/// Open (creating if needed) the database behind `database_url`.
pub async fn create_pool(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, ConnectionError> {
    let config = config.unwrap_or_default();
    if let Some(path) = file_path(database_url) {
        ensure_parent_dir(path)?;
    }

    let options = connect_options(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)?;

    tracing::debug!(url = database_url, max_connections = config.max_connections, "claim store opened");
    Ok(pool)
}

/// Single-connection in-memory pool; every call yields an isolated database.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options(MEMORY_URL)?)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

/// Filesystem path of a `sqlite:` URL, `None` for in-memory databases.
fn file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let rest = rest.split('?').next().unwrap_or(rest);
    if rest.is_empty() || rest == ":memory:" {
        None
    } else {
        Some(Path::new(rest))
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ConnectionError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|source| ConnectionError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })
        }
        _ => Ok(()),
    }
}
