//! SQLite adapter for the outbound action queue.
//!
//! Actions are inserted by `SqliteAssignmentRepository::commit` in the same
//! transaction as the state change; this adapter only reads and settles them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionKind, ActionStatus, OutboundAction};
use crate::domain::ports::OutboundActionRepository;

#[derive(Clone)]
pub struct SqliteOutboundActionRepository {
    pool: SqlitePool,
}

impl SqliteOutboundActionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    id: String,
    assignment_id: String,
    issue_id: String,
    kind: String,
    sequence: i64,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    delivered_at: Option<String>,
}

fn parse_status(s: &str) -> DomainResult<ActionStatus> {
    ActionStatus::from_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("action status: {s}")))
}

fn row_to_action(row: ActionRow) -> DomainResult<OutboundAction> {
    Ok(OutboundAction {
        id: parse_uuid(&row.id)?,
        assignment_id: parse_uuid(&row.assignment_id)?,
        issue_id: parse_uuid(&row.issue_id)?,
        kind: ActionKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("action kind: {}", row.kind)))?,
        sequence: row.sequence as u64,
        status: parse_status(&row.status)?,
        attempts: row.attempts as u32,
        last_error: row.last_error,
        created_at: parse_datetime(&row.created_at)?,
        delivered_at: parse_optional_datetime(row.delivered_at)?,
    })
}

#[async_trait]
impl OutboundActionRepository for SqliteOutboundActionRepository {
    async fn list_pending(&self, limit: usize) -> DomainResult<Vec<OutboundAction>> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            "SELECT * FROM outbound_actions WHERE status = 'pending' ORDER BY created_at ASC, sequence ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_action).collect()
    }

    async fn list_for_assignment(&self, assignment_id: Uuid) -> DomainResult<Vec<OutboundAction>> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            "SELECT * FROM outbound_actions WHERE assignment_id = ? ORDER BY sequence ASC",
        )
        .bind(assignment_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_action).collect()
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query(
            "UPDATE outbound_actions SET status = 'delivered', attempts = attempts + 1, delivered_at = ? WHERE id = ?",
        )
        .bind(format_datetime(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str, give_up: bool) -> DomainResult<()> {
        let status = if give_up { ActionStatus::Failed } else { ActionStatus::Pending };
        sqlx::query(
            "UPDATE outbound_actions SET status = ?, attempts = attempts + 1, last_error = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_obsolete(&self, id: Uuid, reason: &str) -> DomainResult<()> {
        sqlx::query("UPDATE outbound_actions SET status = 'obsolete', last_error = ? WHERE id = ? AND status = 'pending'")
            .bind(reason)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_by_status(&self) -> DomainResult<HashMap<ActionStatus, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM outbound_actions GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (status, n) in rows {
            counts.insert(parse_status(&status)?, n as u64);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteAssignmentRepository, SqliteContributorRepository,
        SqliteIssueRepository, SqliteRepoRepository,
    };
    use crate::domain::models::{Assignment, AssignmentState, Contributor, Issue, Repo};
    use crate::domain::ports::{
        AssignmentRepository, ContributorRepository, IssueRepository, RepoRepository,
    };

    async fn setup_with_action() -> (SqliteOutboundActionRepository, OutboundAction) {
        let pool = create_migrated_test_pool().await.unwrap();
        let now = Utc::now();
        let repo = Repo::new("octo", "hello", now);
        SqliteRepoRepository::new(pool.clone()).create(&repo).await.unwrap();
        let issue = Issue::new(repo.id, 3, "t", now);
        SqliteIssueRepository::new(pool.clone()).create(&issue).await.unwrap();
        let contributor = Contributor::new("bob", now);
        SqliteContributorRepository::new(pool.clone()).create(&contributor).await.unwrap();

        let assignments = SqliteAssignmentRepository::new(pool.clone());
        let a = Assignment::new(issue.id, contributor.id, now);
        assignments.create(&a).await.unwrap();
        let mut next = a.clone();
        next.state = AssignmentState::Stale;
        next.version = 2;
        let action = OutboundAction::new(a.id, issue.id, ActionKind::Reminder, 2, now);
        assignments
            .commit(&next, AssignmentState::Claimed, 1, Some(&action))
            .await
            .unwrap();

        (SqliteOutboundActionRepository::new(pool), action)
    }

    #[tokio::test]
    async fn test_pending_then_delivered() {
        let (store, action) = setup_with_action().await;
        let pending = store.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, action.id);

        store.mark_delivered(action.id, Utc::now()).await.unwrap();
        assert!(store.list_pending(10).await.unwrap().is_empty());

        let stored = &store.list_for_assignment(action.assignment_id).await.unwrap()[0];
        assert_eq!(stored.status, ActionStatus::Delivered);
        assert_eq!(stored.attempts, 1);
        assert!(stored.delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_failures_retry_until_given_up() {
        let (store, action) = setup_with_action().await;

        store.record_failure(action.id, "502 from upstream", false).await.unwrap();
        assert_eq!(store.list_pending(10).await.unwrap().len(), 1);

        store.record_failure(action.id, "502 from upstream", true).await.unwrap();
        assert!(store.list_pending(10).await.unwrap().is_empty());

        let stored = &store.list_for_assignment(action.assignment_id).await.unwrap()[0];
        assert_eq!(stored.status, ActionStatus::Failed);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("502 from upstream"));

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.get(&ActionStatus::Failed), Some(&1));
    }

    #[tokio::test]
    async fn test_obsolete_action_leaves_queue() {
        let (store, action) = setup_with_action().await;
        store.mark_obsolete(action.id, "assignment moved on").await.unwrap();
        assert!(store.list_pending(10).await.unwrap().is_empty());

        let stored = &store.list_for_assignment(action.assignment_id).await.unwrap()[0];
        assert_eq!(stored.status, ActionStatus::Obsolete);
        assert_eq!(stored.attempts, 0);
        assert!(stored.delivered_at.is_none());

        // Delivered actions stay delivered.
        store.mark_delivered(action.id, Utc::now()).await.unwrap();
        store.mark_obsolete(action.id, "late").await.unwrap();
        let stored = &store.list_for_assignment(action.assignment_id).await.unwrap()[0];
        assert_eq!(stored.status, ActionStatus::Delivered);
    }
}
