//! Signal collection.
//!
//! Pulls platform events into the append-only timeline and mirrors a
//! repository's open issues with their assignees.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActivitySignal, Issue, IssueRef, IssueState, Repo, RetryConfig};
use crate::domain::ports::{Clock, IssueFilter, PlatformConnector, Repositories};
use crate::services::retry::with_retry;

/// An open issue as last seen upstream, with its current assignee.
#[derive(Debug, Clone)]
pub struct ObservedIssue {
    pub issue: Issue,
    pub assignee: Option<String>,
}

/// Result of mirroring one repository.
#[derive(Debug, Clone, Default)]
pub struct RepoSnapshot {
    pub open: Vec<ObservedIssue>,
    /// Locally open issues that are no longer open upstream.
    pub closed: Vec<Uuid>,
    pub created: usize,
}

impl RepoSnapshot {
    /// Open issues that currently have an assignee.
    pub fn claims(&self) -> impl Iterator<Item = (&Issue, &str)> {
        self.open
            .iter()
            .filter_map(|o| o.assignee.as_deref().map(|login| (&o.issue, login)))
    }
}

pub struct SignalCollector {
    repos: Repositories,
    connector: Arc<dyn PlatformConnector>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl SignalCollector {
    pub fn new(
        repos: Repositories,
        connector: Arc<dyn PlatformConnector>,
        clock: Arc<dyn Clock>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            connector,
            clock,
            retry,
        }
    }

    async fn repo(&self, repo_id: Uuid) -> DomainResult<Repo> {
        self.repos
            .repos
            .get(repo_id)
            .await?
            .ok_or_else(|| DomainError::RepoNotFound(repo_id.to_string()))
    }

    /// Resolve the platform address of a tracked issue.
    pub async fn issue_ref(&self, issue_id: Uuid) -> DomainResult<(Issue, IssueRef)> {
        let issue = self
            .repos
            .issues
            .get(issue_id)
            .await?
            .ok_or(DomainError::IssueNotFound(issue_id))?;
        let repo = self.repo(issue.repo_id).await?;
        let issue_ref = IssueRef {
            owner: repo.owner,
            repo: repo.name,
            number: issue.number,
        };
        Ok((issue, issue_ref))
    }

    /// Fetch new events for an issue and return its complete timeline.
    ///
    /// Fetching restarts at the newest recorded timestamp (inclusive) and
    /// relies on the dedup key to drop what is already stored. Connector
    /// failures surface as `DomainError::Connector` after retries.
    pub async fn sync(&self, issue_id: Uuid) -> DomainResult<Vec<ActivitySignal>> {
        let (_, issue_ref) = self.issue_ref(issue_id).await?;
        let since = self.repos.signals.latest_occurred_at(issue_id).await?;

        let events = with_retry(&self.retry, "fetch_activity", || {
            self.connector.fetch_activity(&issue_ref, since)
        })
        .await?;

        let fetched = events.len();
        let recorded_at = self.clock.now();
        let signals: Vec<ActivitySignal> = events
            .into_iter()
            .map(|e| ActivitySignal::record(issue_id, e, recorded_at))
            .collect();
        let recorded = self.repos.signals.append(&signals).await?;

        tracing::debug!(
            issue = %issue_ref,
            connector = self.connector.name(),
            fetched,
            recorded,
            "signals synced"
        );

        self.repos.signals.timeline(issue_id).await
    }

    /// Mirror a repository's open issues.
    ///
    /// Creates unknown issues, refreshes titles of known ones, reopens issues
    /// that came back and marks locally open issues missing upstream closed.
    pub async fn sync_repository(&self, repo_id: Uuid) -> DomainResult<RepoSnapshot> {
        let repo = self.repo(repo_id).await?;
        let upstream = with_retry(&self.retry, "list_open_issues", || {
            self.connector.list_open_issues(&repo.owner, &repo.name)
        })
        .await?;

        let now = self.clock.now();
        let mut snapshot = RepoSnapshot::default();
        let mut seen = HashSet::new();

        for p in upstream {
            seen.insert(p.number);
            let issue = match self.repos.issues.get_by_number(repo_id, p.number).await? {
                Some(mut issue) => {
                    if issue.title != p.title || !issue.is_open() {
                        issue.title = p.title.clone();
                        issue.state = IssueState::Open;
                        issue.updated_at = p.updated_at.max(issue.updated_at);
                        self.repos.issues.update(&issue).await?;
                    }
                    issue
                }
                None => {
                    let mut issue = Issue::new(repo_id, p.number, p.title.clone(), p.created_at);
                    issue.updated_at = p.updated_at;
                    self.repos.issues.create(&issue).await?;
                    snapshot.created += 1;
                    issue
                }
            };
            snapshot.open.push(ObservedIssue {
                issue,
                assignee: p.assignee,
            });
        }

        let local_open = self
            .repos
            .issues
            .list(IssueFilter {
                repo_id: Some(repo_id),
                ..IssueFilter::open()
            })
            .await?;
        for mut issue in local_open.into_iter().filter(|i| !seen.contains(&i.number)) {
            issue.state = IssueState::Closed;
            issue.updated_at = now;
            self.repos.issues.update(&issue).await?;
            snapshot.closed.push(issue.id);
        }

        tracing::info!(
            repo = %repo.slug(),
            open = snapshot.open.len(),
            created = snapshot.created,
            closed = snapshot.closed.len(),
            "repository synced"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockConnector;
    use crate::adapters::sqlite::{create_migrated_test_pool, repositories};
    use crate::domain::errors::ConnectorError;
    use crate::domain::models::{PlatformEvent, PlatformIssue, SignalKind};
    use crate::domain::ports::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        repos: Repositories,
        mock: MockConnector,
        collector: SignalCollector,
        repo: Repo,
    }

    async fn setup() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let repos = repositories(pool);
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let repo = Repo::new("octo", "hello", start);
        repos.repos.create(&repo).await.unwrap();
        let mock = MockConnector::new();
        let collector = SignalCollector::new(
            repos.clone(),
            Arc::new(mock.clone()),
            Arc::new(ManualClock::new(start)),
            RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
        );
        Fixture {
            repos,
            mock,
            collector,
            repo,
        }
    }

    fn platform_issue(number: u64, assignee: Option<&str>) -> PlatformIssue {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PlatformIssue {
            number,
            title: format!("issue {number}"),
            state: IssueState::Open,
            assignee: assignee.map(str::to_string),
            created_at: t,
            updated_at: t,
        }
    }

    #[tokio::test]
    async fn test_sync_repository_creates_and_closes() {
        let f = setup().await;
        f.mock
            .set_open_issues("octo", "hello", vec![platform_issue(1, Some("alice")), platform_issue(2, None)])
            .await;
        let snap = f.collector.sync_repository(f.repo.id).await.unwrap();
        assert_eq!(snap.created, 2);
        let claims: Vec<_> = snap.claims().map(|(i, login)| (i.number, login.to_string())).collect();
        assert_eq!(claims, vec![(1, "alice".to_string())]);

        f.mock.set_open_issues("octo", "hello", vec![platform_issue(2, None)]).await;
        let snap = f.collector.sync_repository(f.repo.id).await.unwrap();
        assert_eq!(snap.created, 0);
        assert_eq!(snap.closed.len(), 1);
        let closed = f.repos.issues.get(snap.closed[0]).await.unwrap().unwrap();
        assert_eq!(closed.number, 1);
        assert_eq!(closed.state, IssueState::Closed);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent_and_ordered() {
        let f = setup().await;
        f.mock.set_open_issues("octo", "hello", vec![platform_issue(7, Some("alice"))]).await;
        let snap = f.collector.sync_repository(f.repo.id).await.unwrap();
        let issue = snap.open[0].issue.clone();
        let r = IssueRef {
            owner: "octo".into(),
            repo: "hello".into(),
            number: 7,
        };
        let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        f.mock
            .push_event(&r, PlatformEvent::new(SignalKind::Comment, "alice", t + Duration::hours(2), "c2"))
            .await;
        f.mock
            .push_event(&r, PlatformEvent::new(SignalKind::Commit, "alice", t + Duration::hours(1), "s1"))
            .await;

        let first = f.collector.sync(issue.id).await.unwrap();
        let second = f.collector.sync(issue.id).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].source, "s1");
        assert_eq!(
            first.iter().map(|s| s.id).collect::<Vec<_>>(),
            second.iter().map(|s| s.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_then_surfaced() {
        let f = setup().await;
        f.mock.set_open_issues("octo", "hello", vec![platform_issue(3, Some("alice"))]).await;
        let issue = f.collector.sync_repository(f.repo.id).await.unwrap().open[0].issue.clone();
        let r = IssueRef {
            owner: "octo".into(),
            repo: "hello".into(),
            number: 3,
        };

        f.mock.fail_fetch(&r, ConnectorError::SourceUnavailable("502".into()), 2).await;
        assert!(f.collector.sync(issue.id).await.is_ok());

        f.mock.fail_fetch(&r, ConnectorError::SourceUnavailable("502".into()), 3).await;
        let err = f.collector.sync(issue.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Connector(ConnectorError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_issue_reports_not_found() {
        let f = setup().await;
        f.mock.set_open_issues("octo", "hello", vec![platform_issue(4, None)]).await;
        let issue = f.collector.sync_repository(f.repo.id).await.unwrap().open[0].issue.clone();
        f.mock
            .mark_missing(&IssueRef {
                owner: "octo".into(),
                repo: "hello".into(),
                number: 4,
            })
            .await;
        let err = f.collector.sync(issue.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Connector(ConnectorError::NotFound(_))));
    }
}
