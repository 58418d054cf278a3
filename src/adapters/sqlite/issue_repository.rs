//! SQLite adapter for IssueRepository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Issue, IssueState};
use crate::domain::ports::{IssueFilter, IssueRepository};

#[derive(Clone)]
pub struct SqliteIssueRepository {
    pool: SqlitePool,
}

impl SqliteIssueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: String,
    repo_id: String,
    number: i64,
    title: String,
    state: String,
    created_at: String,
    updated_at: String,
}

fn row_to_issue(row: IssueRow) -> DomainResult<Issue> {
    Ok(Issue {
        id: parse_uuid(&row.id)?,
        repo_id: parse_uuid(&row.repo_id)?,
        number: row.number as u64,
        title: row.title,
        state: IssueState::from_str(&row.state)
            .ok_or_else(|| DomainError::SerializationError(format!("issue state: {}", row.state)))?,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &IssueFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(repo_id) = filter.repo_id {
        qb.push(" AND repo_id = ").push_bind(repo_id.to_string());
    }
    if let Some(state) = filter.state {
        qb.push(" AND state = ").push_bind(state.as_str());
    }
}

#[async_trait]
impl IssueRepository for SqliteIssueRepository {
    async fn create(&self, issue: &Issue) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO issues (id, repo_id, number, title, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(issue.id.to_string())
        .bind(issue.repo_id.to_string())
        .bind(issue.number as i64)
        .bind(&issue.title)
        .bind(issue.state.as_str())
        .bind(format_datetime(issue.created_at))
        .bind(format_datetime(issue.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Issue>> {
        let row: Option<IssueRow> = sqlx::query_as("SELECT * FROM issues WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_issue).transpose()
    }

    async fn get_by_number(&self, repo_id: Uuid, number: u64) -> DomainResult<Option<Issue>> {
        let row: Option<IssueRow> =
            sqlx::query_as("SELECT * FROM issues WHERE repo_id = ? AND number = ?")
                .bind(repo_id.to_string())
                .bind(number as i64)
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_issue).transpose()
    }

    async fn update(&self, issue: &Issue) -> DomainResult<()> {
        let result = sqlx::query("UPDATE issues SET title = ?, state = ?, updated_at = ? WHERE id = ?")
            .bind(&issue.title)
            .bind(issue.state.as_str())
            .bind(format_datetime(issue.updated_at))
            .bind(issue.id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IssueNotFound(issue.id));
        }
        Ok(())
    }

    async fn list(&self, filter: IssueFilter) -> DomainResult<Vec<Issue>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM issues");
        push_filter(&mut qb, &filter);
        qb.push(" ORDER BY created_at DESC, number DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<IssueRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_issue).collect()
    }

    async fn count(&self, filter: IssueFilter) -> DomainResult<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM issues");
        push_filter(&mut qb, &filter);

        let (n,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(n as u64)
    }
}
