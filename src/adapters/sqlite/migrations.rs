//! Embedded schema migrations.
//!
//! Applied versions are recorded in `schema_migrations`. A database whose
//! recorded version is newer than anything this binary embeds is refused
//! instead of being written with an older schema in mind.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration {version} failed: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to read schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
    #[error("Database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply, in version order, every migration newer than the recorded one.
    /// Returns how many were applied.
    pub async fn run_embedded_migrations(&self, mut migrations: Vec<Migration>) -> Result<usize, MigrationError> {
        migrations.sort_by_key(|m| m.version);
        self.ensure_migrations_table().await?;

        let current = self.get_current_version().await?;
        let supported = migrations.last().map_or(0, |m| m.version);
        if current > supported {
            return Err(MigrationError::SchemaTooNew {
                found: current,
                supported,
            });
        }

        let mut applied = 0;
        for migration in migrations.iter().filter(|m| m.version > current) {
            self.apply(migration).await?;
            tracing::info!(version = migration.version, description = migration.description, "schema migrated");
            applied += 1;
        }
        Ok(applied)
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| MigrationError::ExecutionError { version: 0, source })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(version)
    }

    async fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        let failed = |source| MigrationError::ExecutionError {
            version: migration.version,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await.map_err(failed)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)
    }
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "claims, signals and outbound actions",
        sql: include_str!("../../../migrations/001_initial_schema.sql"),
    }]
}
