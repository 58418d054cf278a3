//! Claim bookkeeping: recording, releasing and completing assignments, and
//! mirroring assignees observed upstream.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Assignment, AssignmentState, Contributor, IssueState};
use crate::domain::ports::{Clock, Repositories};
use crate::services::assignment_machine::{terminate, Outcome};
use crate::services::signal_collector::SignalCollector;
use crate::services::trust_scorer::TrustScorer;

const MAX_CAS_RETRIES: u32 = 3;

/// What one `observe_claims` pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub claimed: u64,
    pub released: u64,
    pub completed: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl ClaimReport {
    pub fn absorb(&mut self, other: &ClaimReport) {
        self.claimed += other.claimed;
        self.released += other.released;
        self.completed += other.completed;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

pub struct ClaimService {
    repos: Repositories,
    collector: Arc<SignalCollector>,
    scorer: Arc<TrustScorer>,
    clock: Arc<dyn Clock>,
}

impl ClaimService {
    pub fn new(
        repos: Repositories,
        collector: Arc<SignalCollector>,
        scorer: Arc<TrustScorer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            collector,
            scorer,
            clock,
        }
    }

    async fn contributor_for(&self, login: &str) -> DomainResult<Contributor> {
        if let Some(c) = self.repos.contributors.get_by_login(login).await? {
            return Ok(c);
        }
        let contributor = Contributor::new(login, self.clock.now());
        match self.repos.contributors.create(&contributor).await {
            Ok(()) => Ok(contributor),
            // Lost a creation race; the other writer's row wins.
            Err(DomainError::ValidationFailed(_)) => self
                .repos
                .contributors
                .get_by_login(login)
                .await?
                .ok_or_else(|| DomainError::ContributorNotFound(login.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Record that `login` claimed an issue.
    ///
    /// Claiming again as the current holder returns the existing assignment.
    pub async fn record_claim(
        &self,
        issue_id: Uuid,
        login: &str,
        claimed_at: DateTime<Utc>,
    ) -> DomainResult<Assignment> {
        let login = login.trim();
        if login.is_empty() {
            return Err(DomainError::ValidationFailed("login must not be empty".to_string()));
        }

        let issue = self
            .repos
            .issues
            .get(issue_id)
            .await?
            .ok_or(DomainError::IssueNotFound(issue_id))?;
        if !issue.is_open() {
            return Err(DomainError::ValidationFailed(format!(
                "issue #{} is closed and cannot be claimed",
                issue.number
            )));
        }

        let contributor = self.contributor_for(login).await?;

        if let Some(live) = self.repos.assignments.get_live_for_issue(issue_id).await? {
            return if live.contributor_id == contributor.id {
                Ok(live)
            } else {
                Err(DomainError::ActiveAssignmentExists(issue_id))
            };
        }

        let assignment = Assignment::new(issue_id, contributor.id, claimed_at);
        match self.repos.assignments.create(&assignment).await {
            Ok(()) => {}
            Err(DomainError::ActiveAssignmentExists(_)) => {
                return match self.repos.assignments.get_live_for_issue(issue_id).await? {
                    Some(live) if live.contributor_id == contributor.id => Ok(live),
                    _ => Err(DomainError::ActiveAssignmentExists(issue_id)),
                };
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            assignment_id = %assignment.id,
            issue_id = %issue_id,
            contributor = %contributor.login,
            "claim recorded"
        );
        Ok(assignment)
    }

    /// The contributor gave the issue up.
    pub async fn release(&self, assignment_id: Uuid, at: DateTime<Utc>) -> DomainResult<Assignment> {
        self.finish(assignment_id, AssignmentState::Released, at).await
    }

    /// The work landed.
    pub async fn complete(&self, assignment_id: Uuid, at: DateTime<Utc>) -> DomainResult<Assignment> {
        self.finish(assignment_id, AssignmentState::Completed, at).await
    }

    /// Close an issue, completing its live assignment if there is one.
    pub async fn close_issue(&self, issue_id: Uuid, at: DateTime<Utc>) -> DomainResult<Option<Assignment>> {
        let mut issue = self
            .repos
            .issues
            .get(issue_id)
            .await?
            .ok_or(DomainError::IssueNotFound(issue_id))?;

        let completed = match self.repos.assignments.get_live_for_issue(issue_id).await? {
            Some(live) => Some(self.complete(live.id, at).await?),
            None => None,
        };

        if issue.is_open() {
            issue.state = IssueState::Closed;
            issue.updated_at = at;
            self.repos.issues.update(&issue).await?;
        }
        Ok(completed)
    }

    async fn finish(&self, assignment_id: Uuid, to: AssignmentState, at: DateTime<Utc>) -> DomainResult<Assignment> {
        let mut attempt = 0;
        loop {
            let current = self
                .repos
                .assignments
                .get(assignment_id)
                .await?
                .ok_or(DomainError::AssignmentNotFound(assignment_id))?;

            if current.state == to {
                return Ok(current);
            }

            let at = at.max(current.claimed_at);
            let Outcome::Transition { from, next, .. } = terminate(&current, to, at, self.clock.now()) else {
                return Err(DomainError::InvalidStateTransition {
                    from: current.state.to_string(),
                    to: to.to_string(),
                    reason: "assignment already terminated".to_string(),
                });
            };

            match self.repos.assignments.commit(&next, from, current.version, None).await {
                Ok(()) => {
                    tracing::info!(
                        assignment_id = %next.id,
                        issue_id = %next.issue_id,
                        from = %from,
                        to = %to,
                        "assignment terminated"
                    );
                    if let Err(e) = self.scorer.score(next.contributor_id).await {
                        tracing::warn!(contributor_id = %next.contributor_id, error = %e, "rescoring failed");
                    }
                    return Ok(next);
                }
                Err(DomainError::ConcurrencyConflict { .. }) if attempt < MAX_CAS_RETRIES => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Mirror upstream assignees of one repository into assignments.
    ///
    /// New assignees become claims, a removed or replaced assignee releases
    /// the old claim, and issues no longer open upstream complete theirs.
    pub async fn observe_claims(&self, repo_id: Uuid) -> DomainResult<ClaimReport> {
        let snapshot = self.collector.sync_repository(repo_id).await?;
        let now = self.clock.now();
        let mut report = ClaimReport::default();

        for issue_id in &snapshot.closed {
            match self.repos.assignments.get_live_for_issue(*issue_id).await? {
                Some(live) => match self.complete(live.id, now).await {
                    Ok(_) => report.completed += 1,
                    Err(e) => {
                        tracing::warn!(%issue_id, error = %e, "failed to complete claim on closed issue");
                        report.failed += 1;
                    }
                },
                None => report.unchanged += 1,
            }
        }

        for observed in &snapshot.open {
            let issue = &observed.issue;
            let live = self.repos.assignments.get_live_for_issue(issue.id).await?;
            let result = match (live, observed.assignee.as_deref()) {
                (None, None) => Ok(false),
                (None, Some(login)) => self.record_claim(issue.id, login, now).await.map(|_| {
                    report.claimed += 1;
                    true
                }),
                (Some(live), assignee) => {
                    let holder = self.repos.contributors.get(live.contributor_id).await?;
                    let same = matches!((&holder, assignee), (Some(h), Some(login)) if h.login.eq_ignore_ascii_case(login));
                    if same {
                        Ok(false)
                    } else {
                        self.reassign(&live, assignee, now, &mut report).await.map(|()| true)
                    }
                }
            };

            match result {
                Ok(true) => {}
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(issue_id = %issue.id, number = issue.number, error = %e, "failed to mirror claim");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            %repo_id,
            claimed = report.claimed,
            released = report.released,
            completed = report.completed,
            failed = report.failed,
            "claims observed"
        );
        Ok(report)
    }

    async fn reassign(
        &self,
        live: &Assignment,
        assignee: Option<&str>,
        now: DateTime<Utc>,
        report: &mut ClaimReport,
    ) -> DomainResult<()> {
        self.release(live.id, now).await?;
        report.released += 1;
        if let Some(login) = assignee {
            self.record_claim(live.issue_id, login, now).await?;
            report.claimed += 1;
        }
        Ok(())
    }
}
