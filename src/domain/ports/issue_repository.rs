//! Repository port for issue persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Issue, IssueState};

/// Filter for listing issues, newest first.
#[derive(Debug, Default, Clone)]
pub struct IssueFilter {
    pub repo_id: Option<Uuid>,
    pub state: Option<IssueState>,
    pub limit: Option<usize>,
}

impl IssueFilter {
    pub fn open() -> Self {
        Self {
            state: Some(IssueState::Open),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Create a new issue.
    async fn create(&self, issue: &Issue) -> DomainResult<()>;

    /// Get an issue by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Issue>>;

    /// Get an issue by its number within a repository.
    async fn get_by_number(&self, repo_id: Uuid, number: u64) -> DomainResult<Option<Issue>>;

    /// Update title, state and timestamps of an issue.
    async fn update(&self, issue: &Issue) -> DomainResult<()>;

    /// List issues matching a filter, newest first.
    async fn list(&self, filter: IssueFilter) -> DomainResult<Vec<Issue>>;

    /// Count issues matching a filter (the limit is ignored).
    async fn count(&self, filter: IssueFilter) -> DomainResult<u64>;
}
