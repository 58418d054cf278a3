//! Assignment domain model.
//!
//! An assignment binds one contributor to one issue and carries the
//! lifecycle state driven by the escalation scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Claim observed, no activity yet.
    Claimed,
    /// Contributor has shown activity within the inactivity window.
    Active,
    /// Inactivity window elapsed; reminders are being sent.
    Stale,
    /// Final warning sent; reassignment follows at the deadline.
    Warned,
    /// Warning deadline elapsed without activity (terminal).
    Abandoned,
    /// Issue closed or work merged while the claim was live (terminal).
    Completed,
    /// Contributor explicitly unassigned (terminal).
    Released,
}

impl AssignmentState {
    pub const ALL: [Self; 7] = [
        Self::Claimed,
        Self::Active,
        Self::Stale,
        Self::Warned,
        Self::Abandoned,
        Self::Completed,
        Self::Released,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Warned => "warned",
            Self::Abandoned => "abandoned",
            Self::Completed => "completed",
            Self::Released => "released",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "claimed" => Some(Self::Claimed),
            "active" => Some(Self::Active),
            "stale" => Some(Self::Stale),
            "warned" => Some(Self::Warned),
            "abandoned" => Some(Self::Abandoned),
            "completed" => Some(Self::Completed),
            "released" => Some(Self::Released),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Abandoned | Self::Completed | Self::Released)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Only the reset-to-active edge moves backwards, and `Stale -> Stale`
    /// is the repeated-reminder self loop.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Completed | Self::Released => true,
            Self::Active => matches!(self, Self::Claimed | Self::Stale | Self::Warned),
            Self::Stale => matches!(self, Self::Claimed | Self::Active | Self::Stale),
            Self::Warned => *self == Self::Stale,
            Self::Abandoned => *self == Self::Warned,
            Self::Claimed => false,
        }
    }
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contributor's claim on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub contributor_id: Uuid,
    pub state: AssignmentState,
    /// Optimistic concurrency version, bumped on every committed change.
    pub version: u64,
    pub claimed_at: DateTime<Utc>,
    pub first_activity_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// When the current state was entered (deadline anchor, not sweep time).
    pub state_entered_at: DateTime<Utc>,
    pub reminder_count: u32,
    /// Next moment at which the scheduler must act on this assignment.
    pub escalation_deadline: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Create a freshly claimed assignment.
    pub fn new(issue_id: Uuid, contributor_id: Uuid, claimed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_id,
            contributor_id,
            state: AssignmentState::Claimed,
            version: 1,
            claimed_at,
            first_activity_at: None,
            last_activity_at: None,
            state_entered_at: claimed_at,
            reminder_count: 0,
            escalation_deadline: None,
            terminated_at: None,
            updated_at: claimed_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Time of the most recent activity, falling back to the claim time.
    pub fn activity_anchor(&self) -> DateTime<Utc> {
        self.last_activity_at.unwrap_or(self.claimed_at)
    }
}
