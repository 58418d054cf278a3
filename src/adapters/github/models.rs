//! GitHub REST API v3 payloads.
//!
//! Only the fields the connector reads are modelled; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{IssueState, PlatformEvent, PlatformIssue, SignalKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// An issue returned by `GET /repos/{owner}/{repo}/issues`.
///
/// Pull requests share the endpoint and carry a non-null `pull_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub assignee: Option<GitHubUser>,
    #[serde(default)]
    pub pull_request: Option<GitHubPullRequestRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn into_platform_issue(self) -> PlatformIssue {
        PlatformIssue {
            number: self.number,
            title: self.title,
            state: IssueState::from_str(&self.state).unwrap_or(IssueState::Open),
            assignee: self.assignee.map(|u| u.login),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubPullRequestRef {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// The issue or pull request that cross-referenced this issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSourceIssue {
    pub number: u64,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub pull_request: Option<GitHubPullRequestRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCrossReference {
    #[serde(default)]
    pub issue: Option<GitHubSourceIssue>,
}

/// One entry of `GET /repos/{owner}/{repo}/issues/{number}/timeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubTimelineEvent {
    pub event: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub actor: Option<GitHubUser>,
    /// Set on `commented` entries.
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub assignee: Option<GitHubUser>,
    #[serde(default)]
    pub source: Option<GitHubCrossReference>,
}

impl GitHubTimelineEvent {
    fn event_source(&self) -> Option<String> {
        self.id.map(|id| format!("event:{id}"))
    }

    /// Translate into zero or more platform events.
    ///
    /// Entries without a login (plain `committed` entries carry only a git
    /// author) and kinds irrelevant to claims are dropped.
    pub fn into_platform_events(self) -> Vec<PlatformEvent> {
        let Some(at) = self.created_at else {
            return Vec::new();
        };

        match self.event.as_str() {
            "commented" => {
                let login = self.user.as_ref().or(self.actor.as_ref()).map(|u| u.login.clone());
                match (login, self.id) {
                    (Some(login), Some(id)) => {
                        vec![PlatformEvent::new(SignalKind::Comment, login, at, format!("comment:{id}"))]
                    }
                    _ => Vec::new(),
                }
            }
            "referenced" => match (&self.actor, &self.commit_id) {
                (Some(actor), Some(sha)) => vec![PlatformEvent::new(
                    SignalKind::CommitReference,
                    actor.login.clone(),
                    at,
                    format!("commit:{sha}"),
                )],
                _ => Vec::new(),
            },
            "cross-referenced" => {
                let Some(issue) = self.source.and_then(|s| s.issue) else {
                    return Vec::new();
                };
                let (Some(pr), Some(author)) = (issue.pull_request, issue.user) else {
                    return Vec::new();
                };
                let mut events = vec![PlatformEvent::new(
                    SignalKind::PullRequestOpened,
                    author.login.clone(),
                    at,
                    format!("pr:{}", issue.number),
                )];
                if let Some(merged_at) = pr.merged_at {
                    events.push(PlatformEvent::new(
                        SignalKind::PullRequestMerged,
                        author.login,
                        merged_at,
                        format!("pr-merged:{}", issue.number),
                    ));
                }
                events
            }
            "closed" => match (self.event_source(), self.actor) {
                (Some(source), Some(actor)) => {
                    vec![PlatformEvent::new(SignalKind::IssueClosed, actor.login, at, source)]
                }
                _ => Vec::new(),
            },
            "unassigned" => match (self.event_source(), self.assignee) {
                (Some(source), Some(assignee)) => {
                    vec![PlatformEvent::new(SignalKind::Unassigned, assignee.login, at, source)]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommentRequest {
    pub body: String,
}

/// Body of `DELETE /repos/{owner}/{repo}/issues/{number}/assignees`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAssigneesRequest {
    pub assignees: Vec<String>,
}
