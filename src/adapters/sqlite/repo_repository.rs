//! SQLite adapter for RepoRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, is_unique_violation, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PolicyOverride, Repo};
use crate::domain::ports::RepoRepository;

#[derive(Clone)]
pub struct SqliteRepoRepository {
    pool: SqlitePool,
}

impl SqliteRepoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RepoRow {
    id: String,
    owner: String,
    name: String,
    policy: Option<String>,
    created_at: String,
}

fn row_to_repo(row: RepoRow) -> DomainResult<Repo> {
    let policy = row
        .policy
        .map(|p| serde_json::from_str::<PolicyOverride>(&p))
        .transpose()
        .map_err(|e| DomainError::SerializationError(format!("policy: {e}")))?;

    Ok(Repo {
        id: parse_uuid(&row.id)?,
        owner: row.owner,
        name: row.name,
        policy,
        created_at: parse_datetime(&row.created_at)?,
    })
}

fn policy_json(policy: Option<&PolicyOverride>) -> DomainResult<Option<String>> {
    policy
        .filter(|p| !p.is_empty())
        .map(serde_json::to_string)
        .transpose()
        .map_err(DomainError::from)
}

#[async_trait]
impl RepoRepository for SqliteRepoRepository {
    async fn create(&self, repo: &Repo) -> DomainResult<()> {
        let policy = policy_json(repo.policy.as_ref())?;

        sqlx::query("INSERT INTO repos (id, owner, name, policy, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(repo.id.to_string())
            .bind(&repo.owner)
            .bind(&repo.name)
            .bind(&policy)
            .bind(format_datetime(repo.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::ValidationFailed(format!("repository {} already registered", repo.slug()))
                } else {
                    e.into()
                }
            })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Repo>> {
        let row: Option<RepoRow> = sqlx::query_as("SELECT * FROM repos WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_repo).transpose()
    }

    async fn get_by_slug(&self, owner: &str, name: &str) -> DomainResult<Option<Repo>> {
        let row: Option<RepoRow> = sqlx::query_as("SELECT * FROM repos WHERE owner = ? AND name = ?")
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_repo).transpose()
    }

    async fn set_policy(&self, id: Uuid, policy: Option<PolicyOverride>) -> DomainResult<()> {
        let policy = policy_json(policy.as_ref())?;

        let result = sqlx::query("UPDATE repos SET policy = ? WHERE id = ?")
            .bind(&policy)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RepoNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Repo>> {
        let rows: Vec<RepoRow> = sqlx::query_as("SELECT * FROM repos ORDER BY owner, name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_repo).collect()
    }

    async fn count(&self) -> DomainResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repos")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Utc;

    async fn setup_test_repo() -> SqliteRepoRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRepoRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let store = setup_test_repo().await;
        let repo = Repo::new("octo", "hello", Utc::now());
        store.create(&repo).await.unwrap();

        let found = store.get_by_slug("octo", "hello").await.unwrap().unwrap();
        assert_eq!(found.id, repo.id);
        assert!(found.policy.is_none());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = setup_test_repo().await;
        store.create(&Repo::new("octo", "hello", Utc::now())).await.unwrap();
        let err = store.create(&Repo::new("octo", "hello", Utc::now())).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_set_and_clear_policy() {
        let store = setup_test_repo().await;
        let repo = Repo::new("octo", "hello", Utc::now());
        store.create(&repo).await.unwrap();

        let o = PolicyOverride {
            warning_window_hours: Some(48),
            ..Default::default()
        };
        store.set_policy(repo.id, Some(o)).await.unwrap();
        let found = store.get(repo.id).await.unwrap().unwrap();
        assert_eq!(found.policy, Some(o));

        store.set_policy(repo.id, None).await.unwrap();
        let found = store.get(repo.id).await.unwrap().unwrap();
        assert!(found.policy.is_none());
    }

    #[tokio::test]
    async fn test_set_policy_unknown_repo() {
        let store = setup_test_repo().await;
        let err = store.set_policy(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, DomainError::RepoNotFound(_)));
    }
}
