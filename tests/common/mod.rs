//! Common test utilities for integration tests
//!
//! Provides a harness wiring the engine over an in-memory database, the
//! scripted connector and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use claimwatch::adapters::mock::MockConnector;
use claimwatch::adapters::sqlite::{create_migrated_test_pool, repositories};
use claimwatch::domain::models::{
    Assignment, Config, Issue, IssueRef, PlatformEvent, Repo, SignalKind,
};
use claimwatch::domain::ports::{ManualClock, Repositories};
use claimwatch::services::Engine;

/// Fixed start of every scenario.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

/// Default config with near-zero retry backoff.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config
}

pub struct Harness {
    pub engine: Engine,
    pub repos: Repositories,
    pub mock: MockConnector,
    pub clock: ManualClock,
    pub repo: Repo,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let repos = repositories(create_migrated_test_pool().await.expect("test pool"));
        let clock = ManualClock::new(t0());
        let mock = MockConnector::new();
        let repo = Repo::new("octo", "hello", t0());
        repos.repos.create(&repo).await.expect("create repo");

        let engine = Engine::new(
            &config,
            repos.clone(),
            Arc::new(mock.clone()),
            Arc::new(clock.clone()),
        )
        .expect("engine");

        Self {
            engine,
            repos,
            mock,
            clock,
            repo,
        }
    }

    pub async fn issue(&self, number: u64) -> Issue {
        let issue = Issue::new(self.repo.id, number, format!("issue {number}"), t0());
        self.repos.issues.create(&issue).await.expect("create issue");
        issue
    }

    pub fn issue_ref(&self, number: u64) -> IssueRef {
        IssueRef {
            owner: self.repo.owner.clone(),
            repo: self.repo.name.clone(),
            number,
        }
    }

    pub async fn claim(&self, issue: &Issue, login: &str) -> Assignment {
        self.engine
            .claims
            .record_claim(issue.id, login, t0())
            .await
            .expect("record claim")
    }

    /// Script an upstream event at `t0 + after`.
    pub async fn event(&self, number: u64, kind: SignalKind, actor: &str, after: Duration) {
        let at = t0() + after;
        self.mock
            .push_event(
                &self.issue_ref(number),
                PlatformEvent::new(kind, actor, at, format!("{}-{}", kind.as_str(), at.timestamp())),
            )
            .await;
    }

    /// Move the clock to `t0 + after`.
    pub fn at(&self, after: Duration) {
        self.clock.set(t0() + after);
    }

    pub async fn assignment(&self, id: uuid::Uuid) -> Assignment {
        self.repos
            .assignments
            .get(id)
            .await
            .expect("get assignment")
            .expect("assignment exists")
    }
}

impl Harness {
    /// Sweep, then deliver whatever the sweep queued.
    pub async fn sweep_and_dispatch(&self) -> (claimwatch::services::SweepReport, claimwatch::services::DispatchReport) {
        let sweep = self.engine.scheduler.sweep().await.expect("sweep");
        let dispatch = self.engine.dispatcher.dispatch_pending(50).await.expect("dispatch");
        (sweep, dispatch)
    }
}
