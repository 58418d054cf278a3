//! Repository port for contributor persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Contributor;

/// Filter for listing contributors, highest trust first.
#[derive(Debug, Default, Clone)]
pub struct ContributorFilter {
    pub limit: Option<usize>,
}

#[async_trait]
pub trait ContributorRepository: Send + Sync {
    /// Create a new contributor.
    async fn create(&self, contributor: &Contributor) -> DomainResult<()>;

    /// Get a contributor by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Contributor>>;

    /// Get a contributor by platform login.
    async fn get_by_login(&self, login: &str) -> DomainResult<Option<Contributor>>;

    /// Overwrite score fields (last write wins).
    async fn update(&self, contributor: &Contributor) -> DomainResult<()>;

    /// List contributors ordered by trust score, descending.
    async fn list(&self, filter: ContributorFilter) -> DomainResult<Vec<Contributor>>;

    /// Count all contributors.
    async fn count(&self) -> DomainResult<u64>;
}
