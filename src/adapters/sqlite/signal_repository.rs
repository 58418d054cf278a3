//! SQLite adapter for the append-only activity timeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{sort_timeline, ActivitySignal, SignalKind};
use crate::domain::ports::SignalRepository;

#[derive(Clone)]
pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: String,
    issue_id: String,
    kind: String,
    actor: String,
    occurred_at: String,
    source: String,
    recorded_at: String,
}

fn row_to_signal(row: SignalRow) -> DomainResult<ActivitySignal> {
    Ok(ActivitySignal {
        id: parse_uuid(&row.id)?,
        issue_id: parse_uuid(&row.issue_id)?,
        kind: SignalKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("signal kind: {}", row.kind)))?,
        actor: row.actor,
        occurred_at: parse_datetime(&row.occurred_at)?,
        source: row.source,
        recorded_at: parse_datetime(&row.recorded_at)?,
    })
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn append(&self, signals: &[ActivitySignal]) -> DomainResult<usize> {
        if signals.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for signal in signals {
            let result = sqlx::query(
                r#"INSERT OR IGNORE INTO activity_signals
                   (id, issue_id, kind, actor, occurred_at, source, recorded_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(signal.id.to_string())
            .bind(signal.issue_id.to_string())
            .bind(signal.kind.as_str())
            .bind(&signal.actor)
            .bind(format_datetime(signal.occurred_at))
            .bind(&signal.source)
            .bind(format_datetime(signal.recorded_at))
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn timeline(&self, issue_id: Uuid) -> DomainResult<Vec<ActivitySignal>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            "SELECT * FROM activity_signals WHERE issue_id = ? ORDER BY occurred_at ASC",
        )
        .bind(issue_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut signals = rows
            .into_iter()
            .map(row_to_signal)
            .collect::<DomainResult<Vec<_>>>()?;
        sort_timeline(&mut signals);
        Ok(signals)
    }

    async fn latest_occurred_at(&self, issue_id: Uuid) -> DomainResult<Option<DateTime<Utc>>> {
        let (latest,): (Option<String>,) =
            sqlx::query_as("SELECT MAX(occurred_at) FROM activity_signals WHERE issue_id = ?")
                .bind(issue_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        latest.map(|s| parse_datetime(&s)).transpose()
    }
}
