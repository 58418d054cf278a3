//! Activity signal domain model.
//!
//! Signals are immutable timeline entries observed on the platform. The
//! collector appends them; nothing ever rewrites one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of platform observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Commit,
    PullRequestOpened,
    Comment,
    CommitReference,
    PullRequestMerged,
    IssueClosed,
    Unassigned,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::PullRequestOpened => "pull_request_opened",
            Self::Comment => "comment",
            Self::CommitReference => "commit_reference",
            Self::PullRequestMerged => "pull_request_merged",
            Self::IssueClosed => "issue_closed",
            Self::Unassigned => "unassigned",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(Self::Commit),
            "pull_request_opened" => Some(Self::PullRequestOpened),
            "comment" => Some(Self::Comment),
            "commit_reference" => Some(Self::CommitReference),
            "pull_request_merged" => Some(Self::PullRequestMerged),
            "issue_closed" => Some(Self::IssueClosed),
            "unassigned" => Some(Self::Unassigned),
            _ => None,
        }
    }

    /// Whether this kind counts as contributor work on the claim.
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            Self::Commit
                | Self::PullRequestOpened
                | Self::Comment
                | Self::CommitReference
                | Self::PullRequestMerged
        )
    }
}

/// A raw event as reported by a platform connector, before it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub kind: SignalKind,
    /// Login of the user the event is about.
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    /// Stable upstream identifier (event id, commit sha, comment id).
    pub source: String,
}

impl PlatformEvent {
    pub fn new(
        kind: SignalKind,
        actor: impl Into<String>,
        occurred_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            actor: actor.into(),
            occurred_at,
            source: source.into(),
        }
    }
}

/// A recorded, append-only timeline entry for an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySignal {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub kind: SignalKind,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

impl ActivitySignal {
    pub fn record(issue_id: Uuid, event: PlatformEvent, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_id,
            kind: event.kind,
            actor: event.actor,
            occurred_at: event.occurred_at,
            source: event.source,
            recorded_at,
        }
    }

    /// Deduplication key: replaying the same upstream event maps to the same key.
    pub fn dedup_key(&self) -> (Uuid, &str, DateTime<Utc>, SignalKind) {
        (self.issue_id, self.source.as_str(), self.occurred_at, self.kind)
    }

    pub fn is_by(&self, login: &str) -> bool {
        self.actor.eq_ignore_ascii_case(login)
    }
}

/// Canonical timeline order: time, then kind, then source.
pub fn sort_timeline(signals: &mut [ActivitySignal]) {
    signals.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| a.source.cmp(&b.source))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_names() {
        for kind in [
            SignalKind::Commit,
            SignalKind::PullRequestOpened,
            SignalKind::Comment,
            SignalKind::CommitReference,
            SignalKind::PullRequestMerged,
            SignalKind::IssueClosed,
            SignalKind::Unassigned,
        ] {
            assert_eq!(SignalKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_lifecycle_kinds_are_not_activity() {
        assert!(!SignalKind::IssueClosed.is_activity());
        assert!(!SignalKind::Unassigned.is_activity());
        assert!(SignalKind::Comment.is_activity());
    }

    #[test]
    fn test_timeline_sort_is_stable_on_ties() {
        let issue = Uuid::new_v4();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mk = |kind, source: &str| {
            ActivitySignal::record(issue, PlatformEvent::new(kind, "alice", t, source), t)
        };
        let mut signals = vec![
            mk(SignalKind::Comment, "b"),
            mk(SignalKind::Commit, "z"),
            mk(SignalKind::Comment, "a"),
        ];
        sort_timeline(&mut signals);
        let order: Vec<_> = signals.iter().map(|s| (s.kind, s.source.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (SignalKind::Commit, "z"),
                (SignalKind::Comment, "a"),
                (SignalKind::Comment, "b"),
            ]
        );
    }

    #[test]
    fn test_actor_match_is_case_insensitive() {
        let t = Utc::now();
        let s = ActivitySignal::record(
            Uuid::new_v4(),
            PlatformEvent::new(SignalKind::Commit, "Alice", t, "sha1"),
            t,
        );
        assert!(s.is_by("alice"));
        assert!(!s.is_by("bob"));
    }
}
