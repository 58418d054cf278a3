//! SQLite implementation of the AssignmentRepository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_datetime, format_optional_datetime, is_unique_violation, parse_datetime,
    parse_optional_datetime, parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Assignment, AssignmentState, OutboundAction};
use crate::domain::ports::{AssignmentFilter, AssignmentRepository};

#[derive(Clone)]
pub struct SqliteAssignmentRepository {
    pool: SqlitePool,
}

impl SqliteAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    issue_id: String,
    contributor_id: String,
    state: String,
    version: i64,
    claimed_at: String,
    first_activity_at: Option<String>,
    last_activity_at: Option<String>,
    state_entered_at: String,
    reminder_count: i64,
    escalation_deadline: Option<String>,
    terminated_at: Option<String>,
    updated_at: String,
}

fn parse_state(s: &str) -> DomainResult<AssignmentState> {
    AssignmentState::from_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid assignment state: {s}")))
}

fn row_to_assignment(row: AssignmentRow) -> DomainResult<Assignment> {
    Ok(Assignment {
        id: parse_uuid(&row.id)?,
        issue_id: parse_uuid(&row.issue_id)?,
        contributor_id: parse_uuid(&row.contributor_id)?,
        state: parse_state(&row.state)?,
        version: row.version as u64,
        claimed_at: parse_datetime(&row.claimed_at)?,
        first_activity_at: parse_optional_datetime(row.first_activity_at)?,
        last_activity_at: parse_optional_datetime(row.last_activity_at)?,
        state_entered_at: parse_datetime(&row.state_entered_at)?,
        reminder_count: row.reminder_count as u32,
        escalation_deadline: parse_optional_datetime(row.escalation_deadline)?,
        terminated_at: parse_optional_datetime(row.terminated_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    async fn create(&self, assignment: &Assignment) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO assignments (id, issue_id, contributor_id, state, version, claimed_at,
               first_activity_at, last_activity_at, state_entered_at, reminder_count,
               escalation_deadline, terminated_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.issue_id.to_string())
        .bind(assignment.contributor_id.to_string())
        .bind(assignment.state.as_str())
        .bind(assignment.version as i64)
        .bind(format_datetime(assignment.claimed_at))
        .bind(format_optional_datetime(assignment.first_activity_at))
        .bind(format_optional_datetime(assignment.last_activity_at))
        .bind(format_datetime(assignment.state_entered_at))
        .bind(i64::from(assignment.reminder_count))
        .bind(format_optional_datetime(assignment.escalation_deadline))
        .bind(format_optional_datetime(assignment.terminated_at))
        .bind(format_datetime(assignment.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::ActiveAssignmentExists(assignment.issue_id)
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as("SELECT * FROM assignments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_assignment).transpose()
    }

    async fn get_live_for_issue(&self, issue_id: Uuid) -> DomainResult<Option<Assignment>> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT * FROM assignments WHERE issue_id = ? AND state IN ('claimed', 'active', 'stale', 'warned')",
        )
        .bind(issue_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_assignment).transpose()
    }

    async fn list(&self, filter: AssignmentFilter) -> DomainResult<Vec<Assignment>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM assignments WHERE 1 = 1");

        if let Some(states) = &filter.states {
            if states.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND state IN (");
            let mut sep = qb.separated(", ");
            for state in states {
                sep.push_bind(state.as_str());
            }
            sep.push_unseparated(")");
        }
        if let Some(contributor_id) = filter.contributor_id {
            qb.push(" AND contributor_id = ").push_bind(contributor_id.to_string());
        }
        if let Some(issue_id) = filter.issue_id {
            qb.push(" AND issue_id = ").push_bind(issue_id.to_string());
        }
        qb.push(" ORDER BY claimed_at ASC, id ASC");

        let rows: Vec<AssignmentRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_assignment).collect()
    }

    async fn commit(
        &self,
        next: &Assignment,
        expected_state: AssignmentState,
        expected_version: u64,
        action: Option<&OutboundAction>,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE assignments SET state = ?, version = ?, first_activity_at = ?,
               last_activity_at = ?, state_entered_at = ?, reminder_count = ?,
               escalation_deadline = ?, terminated_at = ?, updated_at = ?
               WHERE id = ? AND version = ? AND state = ?"#,
        )
        .bind(next.state.as_str())
        .bind(next.version as i64)
        .bind(format_optional_datetime(next.first_activity_at))
        .bind(format_optional_datetime(next.last_activity_at))
        .bind(format_datetime(next.state_entered_at))
        .bind(i64::from(next.reminder_count))
        .bind(format_optional_datetime(next.escalation_deadline))
        .bind(format_optional_datetime(next.terminated_at))
        .bind(format_datetime(next.updated_at))
        .bind(next.id.to_string())
        .bind(expected_version as i64)
        .bind(expected_state.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::ConcurrencyConflict {
                entity: "assignment".to_string(),
                id: next.id.to_string(),
            });
        }

        if let Some(action) = action {
            sqlx::query(
                r#"INSERT OR IGNORE INTO outbound_actions (id, assignment_id, issue_id, kind, sequence,
                   status, attempts, last_error, created_at, delivered_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(action.id.to_string())
            .bind(action.assignment_id.to_string())
            .bind(action.issue_id.to_string())
            .bind(action.kind.as_str())
            .bind(action.sequence as i64)
            .bind(action.status.as_str())
            .bind(i64::from(action.attempts))
            .bind(&action.last_error)
            .bind(format_datetime(action.created_at))
            .bind(format_optional_datetime(action.delivered_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_by_state(&self) -> DomainResult<HashMap<AssignmentState, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM assignments GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (state, n) in rows {
            counts.insert(parse_state(&state)?, n as u64);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteContributorRepository, SqliteIssueRepository,
        SqliteOutboundActionRepository, SqliteRepoRepository,
    };
    use crate::domain::models::{ActionKind, Contributor, Issue, Repo};
    use crate::domain::ports::{
        ContributorRepository, IssueRepository, OutboundActionRepository, RepoRepository,
    };
    use chrono::{Duration, Utc};

    struct Fixture {
        pool: SqlitePool,
        store: SqliteAssignmentRepository,
        issue: Issue,
        contributor: Contributor,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let now = Utc::now();
        let repo = Repo::new("octo", "hello", now);
        SqliteRepoRepository::new(pool.clone()).create(&repo).await.unwrap();
        let issue = Issue::new(repo.id, 7, "Fix the thing", now);
        SqliteIssueRepository::new(pool.clone()).create(&issue).await.unwrap();
        let contributor = Contributor::new("alice", now);
        SqliteContributorRepository::new(pool.clone())
            .create(&contributor)
            .await
            .unwrap();

        Fixture {
            store: SqliteAssignmentRepository::new(pool.clone()),
            pool,
            issue,
            contributor,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup().await;
        let a = Assignment::new(f.issue.id, f.contributor.id, Utc::now());
        f.store.create(&a).await.unwrap();

        let found = f.store.get(a.id).await.unwrap().unwrap();
        assert_eq!(found, a);
        let live = f.store.get_live_for_issue(f.issue.id).await.unwrap().unwrap();
        assert_eq!(live.id, a.id);
    }

    #[tokio::test]
    async fn test_second_live_assignment_rejected() {
        let f = setup().await;
        let now = Utc::now();
        f.store
            .create(&Assignment::new(f.issue.id, f.contributor.id, now))
            .await
            .unwrap();

        let err = f
            .store
            .create(&Assignment::new(f.issue.id, f.contributor.id, now))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ActiveAssignmentExists(id) if id == f.issue.id));
    }

    #[tokio::test]
    async fn test_new_claim_allowed_after_termination() {
        let f = setup().await;
        let now = Utc::now();
        let a = Assignment::new(f.issue.id, f.contributor.id, now);
        f.store.create(&a).await.unwrap();

        let mut released = a.clone();
        released.state = AssignmentState::Released;
        released.version = 2;
        released.terminated_at = Some(now);
        f.store
            .commit(&released, AssignmentState::Claimed, 1, None)
            .await
            .unwrap();

        f.store
            .create(&Assignment::new(f.issue.id, f.contributor.id, now + Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(
            f.store
                .list(AssignmentFilter {
                    issue_id: Some(f.issue.id),
                    ..Default::default()
                })
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_commit_writes_state_and_action_together() {
        let f = setup().await;
        let now = Utc::now();
        let a = Assignment::new(f.issue.id, f.contributor.id, now);
        f.store.create(&a).await.unwrap();

        let mut next = a.clone();
        next.state = AssignmentState::Stale;
        next.version = 2;
        next.reminder_count = 1;
        let action = OutboundAction::new(a.id, a.issue_id, ActionKind::Reminder, 2, now);
        f.store
            .commit(&next, AssignmentState::Claimed, 1, Some(&action))
            .await
            .unwrap();

        let stored = f.store.get(a.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AssignmentState::Stale);
        assert_eq!(stored.version, 2);

        let actions = SqliteOutboundActionRepository::new(f.pool.clone())
            .list_for_assignment(a.id)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Reminder);
    }

    #[tokio::test]
    async fn test_stale_commit_is_a_conflict_and_writes_nothing() {
        let f = setup().await;
        let now = Utc::now();
        let a = Assignment::new(f.issue.id, f.contributor.id, now);
        f.store.create(&a).await.unwrap();

        let mut first = a.clone();
        first.state = AssignmentState::Active;
        first.version = 2;
        f.store
            .commit(&first, AssignmentState::Claimed, 1, None)
            .await
            .unwrap();

        // A second writer still holding version 1.
        let mut second = a.clone();
        second.state = AssignmentState::Stale;
        second.version = 2;
        let action = OutboundAction::new(a.id, a.issue_id, ActionKind::Reminder, 2, now);
        let err = f
            .store
            .commit(&second, AssignmentState::Claimed, 1, Some(&action))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

        let stored = f.store.get(a.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AssignmentState::Active);
        let actions = SqliteOutboundActionRepository::new(f.pool.clone())
            .list_for_assignment(a.id)
            .await
            .unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_and_counts() {
        let f = setup().await;
        let now = Utc::now();
        let a = Assignment::new(f.issue.id, f.contributor.id, now);
        f.store.create(&a).await.unwrap();

        assert_eq!(f.store.list(AssignmentFilter::live()).await.unwrap().len(), 1);
        assert!(f
            .store
            .list(AssignmentFilter::history_of(f.contributor.id))
            .await
            .unwrap()
            .is_empty());

        let counts = f.store.count_by_state().await.unwrap();
        assert_eq!(counts.get(&AssignmentState::Claimed), Some(&1));
        assert_eq!(counts.get(&AssignmentState::Active), None);
    }
}
