//! GitHub implementation of the platform connector port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ConnectorResult;
use crate::domain::models::{IssueRef, PlatformEvent, PlatformIssue};
use crate::domain::ports::PlatformConnector;

use super::client::GitHubClient;

pub struct GitHubConnector {
    client: GitHubClient,
}

impl GitHubConnector {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformConnector for GitHubConnector {
    async fn fetch_activity(
        &self,
        issue: &IssueRef,
        since: Option<DateTime<Utc>>,
    ) -> ConnectorResult<Vec<PlatformEvent>> {
        // The timeline endpoint has no `since` filter.
        let entries = self.client.issue_timeline(issue).await?;
        let events: Vec<PlatformEvent> = entries
            .into_iter()
            .flat_map(|e| e.into_platform_events())
            .filter(|e| since.map_or(true, |s| e.occurred_at >= s))
            .collect();

        tracing::debug!(issue = %issue, count = events.len(), "fetched GitHub activity");
        Ok(events)
    }

    async fn list_open_issues(&self, owner: &str, repo: &str) -> ConnectorResult<Vec<PlatformIssue>> {
        let issues = self.client.list_issues(owner, repo, "open").await?;
        Ok(issues.into_iter().map(|i| i.into_platform_issue()).collect())
    }

    async fn post_comment(&self, issue: &IssueRef, body: &str) -> ConnectorResult<()> {
        self.client.post_comment(issue, body).await
    }

    async fn request_reassignment(&self, issue: &IssueRef, assignee: &str) -> ConnectorResult<()> {
        self.client.remove_assignee(issue, assignee).await
    }

    fn name(&self) -> &'static str {
        "github"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GitHubConfig, SignalKind};
    use chrono::TimeZone;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_fetch_activity_applies_since_inclusively() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!([
            {"event": "commented", "id": 1, "user": {"login": "alice"}, "created_at": "2024-01-01T00:00:00Z"},
            {"event": "commented", "id": 2, "user": {"login": "alice"}, "created_at": "2024-01-02T00:00:00Z"},
            {"event": "labeled", "id": 3, "actor": {"login": "bob"}, "created_at": "2024-01-03T00:00:00Z"},
            {"event": "closed", "id": 4, "actor": {"login": "bob"}, "created_at": "2024-01-04T00:00:00Z"}
        ]);
        server
            .mock("GET", "/repos/octo/hello/issues/7/timeline")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let connector = GitHubConnector::new(GitHubClient::new(
            "t",
            &GitHubConfig {
                api_base: server.url(),
                ..Default::default()
            },
        ));
        let issue = IssueRef {
            owner: "octo".into(),
            repo: "hello".into(),
            number: 7,
        };
        let since = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let events = connector.fetch_activity(&issue, Some(since)).await.unwrap();

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![SignalKind::Comment, SignalKind::IssueClosed]);
        assert_eq!(events[0].source, "comment:2");
    }
}
