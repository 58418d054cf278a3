//! In-memory scripted platform connector for tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::errors::{ConnectorError, ConnectorResult};
use crate::domain::models::{IssueRef, PlatformEvent, PlatformIssue};
use crate::domain::ports::PlatformConnector;

#[derive(Default)]
struct MockState {
    events: HashMap<IssueRef, Vec<PlatformEvent>>,
    open_issues: HashMap<(String, String), Vec<PlatformIssue>>,
    missing: HashSet<IssueRef>,
    fetch_failures: HashMap<IssueRef, VecDeque<ConnectorError>>,
    delivery_failures: VecDeque<ConnectorError>,
    comments: Vec<(IssueRef, String)>,
    reassignments: Vec<(IssueRef, String)>,
}

/// Connector whose upstream state is scripted by the caller.
///
/// Fetches honor `since` inclusively like the real connector. Cloning shares
/// the scripted state.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<RwLock<MockState>>,
    fetch_delay: Arc<RwLock<Option<Duration>>>,
    fetch_calls: Arc<AtomicU64>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_event(&self, issue: &IssueRef, event: PlatformEvent) {
        self.state
            .write()
            .await
            .events
            .entry(issue.clone())
            .or_default()
            .push(event);
    }

    pub async fn set_open_issues(&self, owner: &str, repo: &str, issues: Vec<PlatformIssue>) {
        self.state
            .write()
            .await
            .open_issues
            .insert((owner.to_string(), repo.to_string()), issues);
    }

    /// Make every later fetch of `issue` fail with `NotFound`.
    pub async fn mark_missing(&self, issue: &IssueRef) {
        self.state.write().await.missing.insert(issue.clone());
    }

    /// Fail the next `times` fetches of `issue` with `error`.
    pub async fn fail_fetch(&self, issue: &IssueRef, error: ConnectorError, times: usize) {
        let mut state = self.state.write().await;
        let queue = state.fetch_failures.entry(issue.clone()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Fail the next `times` comment or reassignment calls with `error`.
    pub async fn fail_delivery(&self, error: ConnectorError, times: usize) {
        self.state
            .write()
            .await
            .delivery_failures
            .extend(std::iter::repeat(error).take(times));
    }

    /// Delay every fetch, to exercise per-unit timeouts.
    pub async fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.write().await = delay;
    }

    pub async fn comments(&self) -> Vec<(IssueRef, String)> {
        self.state.read().await.comments.clone()
    }

    pub async fn reassignments(&self) -> Vec<(IssueRef, String)> {
        self.state.read().await.reassignments.clone()
    }

    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn next_delivery_failure(&self) -> Option<ConnectorError> {
        self.state.write().await.delivery_failures.pop_front()
    }
}

#[async_trait]
impl PlatformConnector for MockConnector {
    async fn fetch_activity(
        &self,
        issue: &IssueRef,
        since: Option<DateTime<Utc>>,
    ) -> ConnectorResult<Vec<PlatformEvent>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if let Some(err) = state.fetch_failures.get_mut(issue).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if state.missing.contains(issue) {
            return Err(ConnectorError::NotFound(issue.to_string()));
        }

        Ok(state
            .events
            .get(issue)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| since.map_or(true, |s| e.occurred_at >= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_open_issues(&self, owner: &str, repo: &str) -> ConnectorResult<Vec<PlatformIssue>> {
        let state = self.state.read().await;
        state
            .open_issues
            .get(&(owner.to_string(), repo.to_string()))
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("{owner}/{repo}")))
    }

    async fn post_comment(&self, issue: &IssueRef, body: &str) -> ConnectorResult<()> {
        if let Some(err) = self.next_delivery_failure().await {
            return Err(err);
        }
        self.state
            .write()
            .await
            .comments
            .push((issue.clone(), body.to_string()));
        Ok(())
    }

    async fn request_reassignment(&self, issue: &IssueRef, assignee: &str) -> ConnectorResult<()> {
        if let Some(err) = self.next_delivery_failure().await {
            return Err(err);
        }
        self.state
            .write()
            .await
            .reassignments
            .push((issue.clone(), assignee.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SignalKind;
    use chrono::Duration as ChronoDuration;

    fn issue() -> IssueRef {
        IssueRef {
            owner: "octo".into(),
            repo: "hello".into(),
            number: 1,
        }
    }

    #[tokio::test]
    async fn test_scripted_failures_then_events() {
        let mock = MockConnector::new();
        let t = Utc::now();
        mock.push_event(&issue(), PlatformEvent::new(SignalKind::Comment, "alice", t, "c1"))
            .await;
        mock.fail_fetch(&issue(), ConnectorError::SourceUnavailable("down".into()), 1)
            .await;

        assert!(mock.fetch_activity(&issue(), None).await.is_err());
        assert_eq!(mock.fetch_activity(&issue(), None).await.unwrap().len(), 1);
        assert!(mock
            .fetch_activity(&issue(), Some(t + ChronoDuration::seconds(1)))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(mock.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_records_deliveries() {
        let mock = MockConnector::new();
        mock.post_comment(&issue(), "ping").await.unwrap();
        mock.request_reassignment(&issue(), "alice").await.unwrap();
        assert_eq!(mock.comments().await.len(), 1);
        assert_eq!(mock.reassignments().await[0].1, "alice");
    }
}
