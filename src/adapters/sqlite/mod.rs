//! SQLite database adapters for the claimwatch engine.

pub mod assignment_repository;
pub mod connection;
pub mod contributor_repository;
pub mod issue_repository;
pub mod migrations;
pub mod outbound_repository;
pub mod repo_repository;
pub mod signal_repository;

pub use assignment_repository::SqliteAssignmentRepository;
pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use contributor_repository::SqliteContributorRepository;
pub use issue_repository::SqliteIssueRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use outbound_repository::SqliteOutboundActionRepository;
pub use repo_repository::SqliteRepoRepository;
pub use signal_repository::SqliteSignalRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::Repositories;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Fixed-width UTC timestamp so that text ordering matches time ordering.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn format_optional_datetime(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(format_datetime)
}

/// Whether a sqlx error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// SQLite-backed implementations of every persistence port.
pub fn repositories(pool: SqlitePool) -> Repositories {
    Repositories {
        contributors: Arc::new(SqliteContributorRepository::new(pool.clone())),
        repos: Arc::new(SqliteRepoRepository::new(pool.clone())),
        issues: Arc::new(SqliteIssueRepository::new(pool.clone())),
        assignments: Arc::new(SqliteAssignmentRepository::new(pool.clone())),
        signals: Arc::new(SqliteSignalRepository::new(pool.clone())),
        outbound: Arc::new(SqliteOutboundActionRepository::new(pool)),
    }
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_format_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let s = format_datetime(t);
        assert_eq!(s, "2024-05-06T07:08:09.000000Z");
        assert_eq!(parse_datetime(&s).unwrap(), t);
    }

    #[test]
    fn test_datetime_text_order_matches_time_order() {
        let a = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert!(format_datetime(a) < format_datetime(b));
    }

    #[test]
    fn test_parse_invalid_values() {
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_datetime("yesterday").is_err());
        assert_eq!(parse_optional_datetime(None).unwrap(), None);
    }
}
