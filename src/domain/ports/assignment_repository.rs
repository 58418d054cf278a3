//! Repository port for assignment persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Assignment, AssignmentState, OutboundAction};

/// Filter for listing assignments.
#[derive(Debug, Default, Clone)]
pub struct AssignmentFilter {
    pub states: Option<Vec<AssignmentState>>,
    pub contributor_id: Option<Uuid>,
    pub issue_id: Option<Uuid>,
}

impl AssignmentFilter {
    /// All assignments that have not reached a terminal state.
    pub fn live() -> Self {
        Self {
            states: Some(
                AssignmentState::ALL
                    .into_iter()
                    .filter(|s| !s.is_terminal())
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Terminated assignments of one contributor.
    pub fn history_of(contributor_id: Uuid) -> Self {
        Self {
            states: Some(
                AssignmentState::ALL
                    .into_iter()
                    .filter(AssignmentState::is_terminal)
                    .collect(),
            ),
            contributor_id: Some(contributor_id),
            issue_id: None,
        }
    }
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Create a new assignment.
    ///
    /// Fails with `ActiveAssignmentExists` when the issue already has a
    /// non-terminal assignment.
    async fn create(&self, assignment: &Assignment) -> DomainResult<()>;

    /// Get an assignment by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Assignment>>;

    /// Get the non-terminal assignment of an issue, if any.
    async fn get_live_for_issue(&self, issue_id: Uuid) -> DomainResult<Option<Assignment>>;

    /// List assignments matching a filter.
    async fn list(&self, filter: AssignmentFilter) -> DomainResult<Vec<Assignment>>;

    /// Commit a change made on a copy read at `expected_version`.
    ///
    /// The stored row must still be at `(expected_state, expected_version)`;
    /// otherwise nothing is written and `ConcurrencyConflict` is returned.
    /// `next.version` must be `expected_version + 1`. The optional action is
    /// inserted in the same transaction.
    async fn commit(
        &self,
        next: &Assignment,
        expected_state: AssignmentState,
        expected_version: u64,
        action: Option<&OutboundAction>,
    ) -> DomainResult<()>;

    /// Count assignments per state.
    async fn count_by_state(&self) -> DomainResult<HashMap<AssignmentState, u64>>;
}
