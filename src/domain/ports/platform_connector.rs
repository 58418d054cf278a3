//! Port for the code-hosting platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ConnectorResult;
use crate::domain::models::{IssueRef, PlatformEvent, PlatformIssue};

#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Events on an issue at or after `since` (all events when `None`).
    async fn fetch_activity(
        &self,
        issue: &IssueRef,
        since: Option<DateTime<Utc>>,
    ) -> ConnectorResult<Vec<PlatformEvent>>;

    /// Open issues of a repository with their current assignee.
    async fn list_open_issues(&self, owner: &str, repo: &str) -> ConnectorResult<Vec<PlatformIssue>>;

    /// Post a comment on an issue.
    async fn post_comment(&self, issue: &IssueRef, body: &str) -> ConnectorResult<()>;

    /// Unassign `assignee` so the issue can be picked up by someone else.
    async fn request_reassignment(&self, issue: &IssueRef, assignee: &str) -> ConnectorResult<()>;

    /// Connector name for logs.
    fn name(&self) -> &'static str;
}
