//! Escalation scheduler.
//!
//! A sweep evaluates every live assignment as an isolated unit. Units run on
//! a semaphore-gated `JoinSet`, each under its own timeout, and the sweep as
//! a whole stops at a deadline. State changes are committed with a
//! compare-and-swap together with the outbound action they produce.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::domain::errors::{ConnectorError, DomainError, DomainResult};
use crate::domain::models::{Assignment, AssignmentState, IssueState, OutboundAction, SchedulerConfig};
use crate::domain::ports::{AssignmentFilter, Clock, Repositories};
use crate::services::assignment_machine::{evaluate, terminate, Outcome};
use crate::services::reminder_policy::ReminderPolicyTable;
use crate::services::signal_collector::SignalCollector;
use crate::services::trust_scorer::TrustScorer;

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub evaluated: u64,
    pub transitioned: u64,
    pub touched: u64,
    pub unchanged: u64,
    /// Units skipped this tick (source unavailable or timed out).
    pub deferred: u64,
    pub failed: u64,
    /// Units cut off by the sweep deadline.
    pub aborted: u64,
    pub actions_enqueued: u64,
}

impl SweepReport {
    fn record(&mut self, unit: UnitOutcome) {
        match unit {
            UnitOutcome::Unchanged => self.unchanged += 1,
            UnitOutcome::Touched => self.touched += 1,
            UnitOutcome::Transitioned { action_enqueued, .. } => {
                self.transitioned += 1;
                if action_enqueued {
                    self.actions_enqueued += 1;
                }
            }
            UnitOutcome::Deferred => self.deferred += 1,
            UnitOutcome::Failed => self.failed += 1,
        }
        self.evaluated += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Unchanged,
    Touched,
    Transitioned { action_enqueued: bool },
    Deferred,
    Failed,
}

pub struct EscalationScheduler {
    repos: Repositories,
    collector: Arc<SignalCollector>,
    scorer: Arc<TrustScorer>,
    policies: Arc<ReminderPolicyTable>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl EscalationScheduler {
    pub fn new(
        repos: Repositories,
        collector: Arc<SignalCollector>,
        scorer: Arc<TrustScorer>,
        policies: Arc<ReminderPolicyTable>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repos,
            collector,
            scorer,
            policies,
            clock,
            config,
        }
    }

    /// Evaluate every live assignment once.
    pub async fn sweep(self: &Arc<Self>) -> DomainResult<SweepReport> {
        let live = self.repos.assignments.list(AssignmentFilter::live()).await?;
        let started = self.clock.now();
        tracing::info!(live = live.len(), at = %started, "sweep started");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));
        let unit_timeout = Duration::from_secs(self.config.assignment_timeout_secs);
        let mut units = JoinSet::new();

        for assignment in live {
            let this = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            units.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return UnitOutcome::Failed;
                };
                match tokio::time::timeout(unit_timeout, this.process(assignment.id)).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        tracing::error!(assignment_id = %assignment.id, error = %e, "assignment evaluation failed");
                        UnitOutcome::Failed
                    }
                    Err(_) => {
                        tracing::warn!(assignment_id = %assignment.id, "assignment evaluation timed out, deferred");
                        UnitOutcome::Deferred
                    }
                }
            });
        }

        let mut report = SweepReport::default();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.sweep_deadline_secs);
        loop {
            match tokio::time::timeout_at(deadline, units.join_next()).await {
                Ok(Some(Ok(outcome))) => report.record(outcome),
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "assignment unit panicked");
                    report.record(UnitOutcome::Failed);
                }
                Ok(None) => break,
                Err(_) => {
                    report.aborted = units.len() as u64;
                    tracing::warn!(aborted = report.aborted, "sweep deadline reached, aborting remaining units");
                    units.shutdown().await;
                    break;
                }
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            transitioned = report.transitioned,
            deferred = report.deferred,
            failed = report.failed,
            aborted = report.aborted,
            actions = report.actions_enqueued,
            "sweep finished"
        );
        Ok(report)
    }

    /// Evaluate one assignment, retrying locally on version conflicts.
    async fn process(&self, assignment_id: Uuid) -> DomainResult<UnitOutcome> {
        let mut attempt = 0;
        loop {
            match self.evaluate_once(assignment_id).await {
                Err(DomainError::ConcurrencyConflict { .. }) if attempt < self.config.max_transition_retries => {
                    attempt += 1;
                    tracing::debug!(%assignment_id, attempt, "version conflict, re-evaluating");
                }
                result => return result,
            }
        }
    }

    async fn evaluate_once(&self, assignment_id: Uuid) -> DomainResult<UnitOutcome> {
        let Some(a) = self.repos.assignments.get(assignment_id).await? else {
            return Ok(UnitOutcome::Unchanged);
        };
        if a.is_terminal() {
            return Ok(UnitOutcome::Unchanged);
        }

        let mut issue = self
            .repos
            .issues
            .get(a.issue_id)
            .await?
            .ok_or(DomainError::IssueNotFound(a.issue_id))?;
        if !issue.is_open() {
            let at = issue.updated_at.max(a.claimed_at);
            return self.apply(&a, terminate(&a, AssignmentState::Completed, at, self.clock.now())).await;
        }

        let timeline = match self.collector.sync(a.issue_id).await {
            Ok(timeline) => timeline,
            Err(DomainError::Connector(ConnectorError::NotFound(reason))) => {
                let now = self.clock.now();
                tracing::warn!(assignment_id = %a.id, issue_id = %a.issue_id, %reason, "issue gone upstream, completing");
                let outcome = self.apply(&a, terminate(&a, AssignmentState::Completed, now, now)).await?;
                issue.state = IssueState::Closed;
                issue.updated_at = now;
                self.repos.issues.update(&issue).await?;
                return Ok(outcome);
            }
            Err(DomainError::Connector(e)) if e.is_transient() => {
                tracing::warn!(assignment_id = %a.id, error = %e, "source unavailable, deferring");
                return Ok(UnitOutcome::Deferred);
            }
            Err(e) => return Err(e),
        };

        let contributor = self
            .repos
            .contributors
            .get(a.contributor_id)
            .await?
            .ok_or_else(|| DomainError::ContributorNotFound(a.contributor_id.to_string()))?;
        let repo = self
            .repos
            .repos
            .get(issue.repo_id)
            .await?
            .ok_or_else(|| DomainError::RepoNotFound(issue.repo_id.to_string()))?;

        let policy = self.policies.policy(&repo);
        let thresholds = self.policies.thresholds(&policy, contributor.trust_score);
        let now = self.clock.now();

        let outcome = evaluate(&a, &timeline, &contributor.login, &thresholds, now);
        self.apply(&a, outcome).await
    }

    async fn apply(&self, current: &Assignment, outcome: Outcome) -> DomainResult<UnitOutcome> {
        match outcome {
            Outcome::Unchanged => Ok(UnitOutcome::Unchanged),
            Outcome::Touched(next) => {
                self.repos
                    .assignments
                    .commit(&next, current.state, current.version, None)
                    .await?;
                Ok(UnitOutcome::Touched)
            }
            Outcome::Transition { from, to, next, action } => {
                let action = action.map(|kind| {
                    OutboundAction::new(next.id, next.issue_id, kind, next.version, next.updated_at)
                });
                self.repos
                    .assignments
                    .commit(&next, from, current.version, action.as_ref())
                    .await?;

                tracing::info!(
                    assignment_id = %next.id,
                    issue_id = %next.issue_id,
                    from = %from,
                    to = %to,
                    action = action.as_ref().map(|a| a.kind.as_str()),
                    "assignment transitioned"
                );

                if to.is_terminal() {
                    if let Err(e) = self.scorer.score(next.contributor_id).await {
                        tracing::warn!(contributor_id = %next.contributor_id, error = %e, "rescoring failed");
                    }
                }

                Ok(UnitOutcome::Transitioned {
                    action_enqueued: action.is_some(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockConnector;
    use crate::adapters::sqlite::{create_migrated_test_pool, repositories};
    use crate::domain::models::{ActionKind, Config, Issue, IssueRef, Repo};
    use crate::domain::ports::ManualClock;
    use crate::services::engine::Engine;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn hours(n: i64) -> chrono::Duration {
        chrono::Duration::hours(n)
    }

    struct Fixture {
        engine: Engine,
        mock: MockConnector,
        clock: ManualClock,
        issue: Issue,
        issue_ref: IssueRef,
        assignment: Assignment,
    }

    async fn setup(mut config: Config) -> Fixture {
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 2;
        let repos = repositories(create_migrated_test_pool().await.unwrap());
        let clock = ManualClock::new(t0());
        let mock = MockConnector::new();

        let repo = Repo::new("octo", "hello", t0());
        repos.repos.create(&repo).await.unwrap();
        let issue = Issue::new(repo.id, 7, "flaky test", t0());
        repos.issues.create(&issue).await.unwrap();

        let engine = Engine::new(&config, repos, Arc::new(mock.clone()), Arc::new(clock.clone())).unwrap();
        let assignment = engine.claims.record_claim(issue.id, "alice", t0()).await.unwrap();
        Fixture {
            engine,
            mock,
            clock,
            issue_ref: IssueRef {
                owner: "octo".into(),
                repo: "hello".into(),
                number: 7,
            },
            issue,
            assignment,
        }
    }

    async fn state_of(f: &Fixture) -> Assignment {
        f.engine.repos.assignments.get(f.assignment.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_sweep_before_grace_changes_nothing() {
        let f = setup(Config::default()).await;
        f.clock.advance(hours(72));

        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(state_of(&f).await.state, AssignmentState::Claimed);
    }

    #[tokio::test]
    async fn test_repeated_sweep_enqueues_one_reminder() {
        let f = setup(Config::default()).await;
        f.clock.advance(hours(73));

        let first = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(first.transitioned, 1);
        assert_eq!(first.actions_enqueued, 1);

        let second = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(second.transitioned, 0);
        assert_eq!(second.unchanged, 1);

        let actions = f
            .engine
            .repos
            .outbound
            .list_for_assignment(f.assignment.id)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Reminder);

        let a = state_of(&f).await;
        assert_eq!(a.state, AssignmentState::Stale);
        assert_eq!(a.state_entered_at, t0() + hours(72));
    }

    #[tokio::test]
    async fn test_unavailable_source_defers_assignment() {
        let f = setup(Config::default()).await;
        f.mock
            .fail_fetch(&f.issue_ref, ConnectorError::SourceUnavailable("502".into()), 10)
            .await;
        f.clock.advance(hours(100));

        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(report.transitioned, 0);
        assert_eq!(state_of(&f).await.state, AssignmentState::Claimed);
    }

    #[tokio::test]
    async fn test_issue_gone_upstream_completes_claim() {
        let f = setup(Config::default()).await;
        f.mock.mark_missing(&f.issue_ref).await;
        f.clock.advance(hours(5));

        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.transitioned, 1);
        assert_eq!(report.actions_enqueued, 0);
        assert_eq!(state_of(&f).await.state, AssignmentState::Completed);

        let issue = f.engine.repos.issues.get(f.issue.id).await.unwrap().unwrap();
        assert!(!issue.is_open());
    }

    #[tokio::test]
    async fn test_locally_closed_issue_completes_without_fetch() {
        let f = setup(Config::default()).await;
        let mut issue = f.issue.clone();
        issue.state = IssueState::Closed;
        issue.updated_at = t0() + hours(2);
        f.engine.repos.issues.update(&issue).await.unwrap();
        f.clock.advance(hours(3));

        f.engine.scheduler.sweep().await.unwrap();
        let a = state_of(&f).await;
        assert_eq!(a.state, AssignmentState::Completed);
        assert_eq!(a.terminated_at, Some(t0() + hours(2)));
        assert_eq!(f.mock.fetch_calls(), 0);

        let alice = f.engine.repos.contributors.get(a.contributor_id).await.unwrap().unwrap();
        assert_eq!(alice.completed_claims, 1);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out_and_defers() {
        let mut config = Config::default();
        config.scheduler.assignment_timeout_secs = 1;
        let f = setup(config).await;
        f.mock.set_fetch_delay(Some(Duration::from_secs(5))).await;
        f.clock.advance(hours(100));

        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(state_of(&f).await.state, AssignmentState::Claimed);
    }

    #[tokio::test]
    async fn test_sweep_deadline_aborts_slow_units_and_keeps_committed_ones() {
        let mut config = Config::default();
        config.scheduler.sweep_deadline_secs = 1;
        config.scheduler.assignment_timeout_secs = 30;
        let f = setup(config).await;

        // A second claim whose issue is already closed locally commits without
        // touching the connector.
        let repo_id = f.issue.repo_id;
        let mut closed = Issue::new(repo_id, 8, "already fixed", t0());
        f.engine.repos.issues.create(&closed).await.unwrap();
        let finished = f.engine.claims.record_claim(closed.id, "bob", t0()).await.unwrap();
        closed.state = IssueState::Closed;
        closed.updated_at = t0() + hours(1);
        f.engine.repos.issues.update(&closed).await.unwrap();

        f.mock.set_fetch_delay(Some(Duration::from_secs(5))).await;
        f.clock.advance(hours(100));

        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.aborted, 1);
        assert_eq!(report.transitioned, 1);
        assert_eq!(state_of(&f).await.state, AssignmentState::Claimed);
        let bob = f.engine.repos.assignments.get(finished.id).await.unwrap().unwrap();
        assert_eq!(bob.state, AssignmentState::Completed);

        // The aborted unit is picked up again by the next sweep.
        f.mock.set_fetch_delay(None).await;
        let report = f.engine.scheduler.sweep().await.unwrap();
        assert_eq!(report.aborted, 0);
        assert_eq!(report.transitioned, 1);
        assert_eq!(state_of(&f).await.state, AssignmentState::Stale);
        let bob = f.engine.repos.assignments.get(finished.id).await.unwrap().unwrap();
        assert_eq!(bob.state, AssignmentState::Completed);
    }
}
