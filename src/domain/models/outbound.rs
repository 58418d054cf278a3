//! Outbound actions queued by the escalation scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Friendly reminder comment while stale.
    Reminder,
    /// Final warning comment before reassignment.
    Warning,
    /// Request to unassign the contributor.
    Reassignment,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Warning => "warning",
            Self::Reassignment => "reassignment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "reminder" => Some(Self::Reminder),
            "warning" => Some(Self::Warning),
            "reassignment" => Some(Self::Reassignment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Delivered,
    Failed,
    /// Superseded by a later transition before it could be delivered.
    Obsolete,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Obsolete => "obsolete",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            "obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }
}

/// A queued notification or reassignment request.
///
/// `(assignment_id, kind, sequence)` is unique; `sequence` is the assignment
/// version the transition committed, so re-sweeps cannot enqueue twice.
/// A reminder or warning whose `sequence` no longer matches the assignment
/// version is stale and must not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAction {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub issue_id: Uuid,
    pub kind: ActionKind,
    pub sequence: u64,
    pub status: ActionStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboundAction {
    pub fn new(
        assignment_id: Uuid,
        issue_id: Uuid,
        kind: ActionKind,
        sequence: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id,
            issue_id,
            kind,
            sequence,
            status: ActionStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at,
            delivered_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status_names() {
        for kind in [ActionKind::Reminder, ActionKind::Warning, ActionKind::Reassignment] {
            assert_eq!(ActionKind::from_str(kind.as_str()), Some(kind));
        }
        for status in [
            ActionStatus::Pending,
            ActionStatus::Delivered,
            ActionStatus::Failed,
            ActionStatus::Obsolete,
        ] {
            assert_eq!(ActionStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_new_action_is_pending() {
        let a = OutboundAction::new(Uuid::new_v4(), Uuid::new_v4(), ActionKind::Warning, 3, Utc::now());
        assert_eq!(a.status, ActionStatus::Pending);
        assert_eq!(a.attempts, 0);
        assert_eq!(a.sequence, 3);
    }
}
