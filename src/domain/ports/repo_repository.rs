//! Repository port for watched code-hosting repositories.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{PolicyOverride, Repo};

#[async_trait]
pub trait RepoRepository: Send + Sync {
    /// Register a repository.
    async fn create(&self, repo: &Repo) -> DomainResult<()>;

    /// Get a repository by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Repo>>;

    /// Get a repository by `owner/name`.
    async fn get_by_slug(&self, owner: &str, name: &str) -> DomainResult<Option<Repo>>;

    /// Replace the policy override of a repository.
    async fn set_policy(&self, id: Uuid, policy: Option<PolicyOverride>) -> DomainResult<()>;

    /// List all repositories.
    async fn list(&self) -> DomainResult<Vec<Repo>>;

    /// Count all repositories.
    async fn count(&self) -> DomainResult<u64>;
}
