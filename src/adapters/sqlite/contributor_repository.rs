//! SQLite adapter for ContributorRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_datetime, format_optional_datetime, is_unique_violation, parse_datetime,
    parse_optional_datetime, parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Contributor;
use crate::domain::ports::{ContributorFilter, ContributorRepository};

#[derive(Clone)]
pub struct SqliteContributorRepository {
    pool: SqlitePool,
}

impl SqliteContributorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContributorRow {
    id: String,
    login: String,
    trust_score: f64,
    confidence: f64,
    completed_claims: i64,
    abandoned_claims: i64,
    released_claims: i64,
    avg_time_to_first_activity_secs: Option<i64>,
    scored_at: Option<String>,
    created_at: String,
}

fn row_to_contributor(row: ContributorRow) -> DomainResult<Contributor> {
    Ok(Contributor {
        id: parse_uuid(&row.id)?,
        login: row.login,
        trust_score: row.trust_score,
        confidence: row.confidence,
        completed_claims: row.completed_claims as u32,
        abandoned_claims: row.abandoned_claims as u32,
        released_claims: row.released_claims as u32,
        avg_time_to_first_activity_secs: row.avg_time_to_first_activity_secs,
        scored_at: parse_optional_datetime(row.scored_at)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ContributorRepository for SqliteContributorRepository {
    async fn create(&self, contributor: &Contributor) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO contributors (id, login, trust_score, confidence, completed_claims,
               abandoned_claims, released_claims, avg_time_to_first_activity_secs, scored_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(contributor.id.to_string())
        .bind(&contributor.login)
        .bind(contributor.trust_score)
        .bind(contributor.confidence)
        .bind(i64::from(contributor.completed_claims))
        .bind(i64::from(contributor.abandoned_claims))
        .bind(i64::from(contributor.released_claims))
        .bind(contributor.avg_time_to_first_activity_secs)
        .bind(format_optional_datetime(contributor.scored_at))
        .bind(format_datetime(contributor.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::ValidationFailed(format!("contributor {} already exists", contributor.login))
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Contributor>> {
        let row: Option<ContributorRow> = sqlx::query_as("SELECT * FROM contributors WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_contributor).transpose()
    }

    async fn get_by_login(&self, login: &str) -> DomainResult<Option<Contributor>> {
        // Column collation makes this case-insensitive.
        let row: Option<ContributorRow> = sqlx::query_as("SELECT * FROM contributors WHERE login = ?")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_contributor).transpose()
    }

    async fn update(&self, contributor: &Contributor) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE contributors SET trust_score = ?, confidence = ?, completed_claims = ?,
               abandoned_claims = ?, released_claims = ?, avg_time_to_first_activity_secs = ?,
               scored_at = ?
               WHERE id = ?"#,
        )
        .bind(contributor.trust_score)
        .bind(contributor.confidence)
        .bind(i64::from(contributor.completed_claims))
        .bind(i64::from(contributor.abandoned_claims))
        .bind(i64::from(contributor.released_claims))
        .bind(contributor.avg_time_to_first_activity_secs)
        .bind(format_optional_datetime(contributor.scored_at))
        .bind(contributor.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ContributorNotFound(contributor.login.clone()));
        }
        Ok(())
    }

    async fn list(&self, filter: ContributorFilter) -> DomainResult<Vec<Contributor>> {
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let rows: Vec<ContributorRow> = sqlx::query_as(
            "SELECT * FROM contributors ORDER BY trust_score DESC, login ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_contributor).collect()
    }

    async fn count(&self) -> DomainResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contributors")
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

    async fn setup_test_repo() -> SqliteContributorRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteContributorRepository::new(pool)
    }

    #[tokio::test]
    async fn test_login_lookup_ignores_case() {
        let repo = setup_test_repo().await;
        let c = Contributor::new("OctoCat", Utc::now());
        repo.create(&c).await.unwrap();

        let found = repo.get_by_login("octocat").await.unwrap().unwrap();
        assert_eq!(found.id, c.id);
        assert_eq!(found.login, "OctoCat");

        let err = repo.create(&Contributor::new("octocat", Utc::now())).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_update_overwrites_score() {
        let repo = setup_test_repo().await;
        let mut c = Contributor::new("alice", Utc::now());
        repo.create(&c).await.unwrap();

        c.trust_score = 0.9;
        c.confidence = 0.4;
        c.completed_claims = 4;
        c.avg_time_to_first_activity_secs = Some(3600);
        c.scored_at = Some(Utc::now());
        repo.update(&c).await.unwrap();

        let found = repo.get(c.id).await.unwrap().unwrap();
        assert!((found.trust_score - 0.9).abs() < 1e-9);
        assert_eq!(found.completed_claims, 4);
        assert_eq!(found.avg_time_to_first_activity_secs, Some(3600));
    }

    #[tokio::test]
    async fn test_list_orders_by_trust_desc() {
        let repo = setup_test_repo().await;
        for (login, score) in [("low", 0.1), ("high", 0.95), ("mid", 0.5)] {
            let mut c = Contributor::new(login, Utc::now());
            c.trust_score = score;
            repo.create(&c).await.unwrap();
        }

        let all = repo.list(ContributorFilter::default()).await.unwrap();
        let logins: Vec<_> = all.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["high", "mid", "low"]);

        let top = repo.list(ContributorFilter { limit: Some(1) }).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
