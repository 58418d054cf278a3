//! Service wiring.
//!
//! Builds every service over one set of repositories, one connector and one
//! clock, and runs the per-tick pipeline: mirror claims, sweep, deliver.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::Config;
use crate::domain::ports::{Clock, PlatformConnector, Repositories};
use crate::services::claim_service::{ClaimReport, ClaimService};
use crate::services::escalation_scheduler::{EscalationScheduler, SweepReport};
use crate::services::outbound_dispatcher::{DispatchReport, OutboundDispatcher};
use crate::services::reminder_policy::ReminderPolicyTable;
use crate::services::signal_collector::SignalCollector;
use crate::services::trust_scorer::TrustScorer;

/// Everything one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub repos_observed: u64,
    pub repos_failed: u64,
    pub claims: ClaimReport,
    pub sweep: SweepReport,
    pub dispatch: DispatchReport,
}

pub struct Engine {
    pub repos: Repositories,
    pub clock: Arc<dyn Clock>,
    pub connector: Arc<dyn PlatformConnector>,
    pub policies: Arc<ReminderPolicyTable>,
    pub collector: Arc<SignalCollector>,
    pub scorer: Arc<TrustScorer>,
    pub claims: Arc<ClaimService>,
    pub scheduler: Arc<EscalationScheduler>,
    pub dispatcher: Arc<OutboundDispatcher>,
    batch_size: usize,
}

impl Engine {
    pub fn new(
        config: &Config,
        repos: Repositories,
        connector: Arc<dyn PlatformConnector>,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<Self> {
        let policies = Arc::new(ReminderPolicyTable::new(config.policy, config.trust_scaling)?);
        let collector = Arc::new(SignalCollector::new(
            repos.clone(),
            connector.clone(),
            clock.clone(),
            config.retry.clone(),
        ));
        let scorer = Arc::new(TrustScorer::new(
            repos.contributors.clone(),
            repos.assignments.clone(),
            clock.clone(),
            config.scoring,
        ));
        let claims = Arc::new(ClaimService::new(
            repos.clone(),
            collector.clone(),
            scorer.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(EscalationScheduler::new(
            repos.clone(),
            collector.clone(),
            scorer.clone(),
            policies.clone(),
            clock.clone(),
            config.scheduler.clone(),
        ));
        let dispatcher = Arc::new(OutboundDispatcher::new(
            repos.clone(),
            collector.clone(),
            connector.clone(),
            clock.clone(),
            config.dispatch.clone(),
        ));

        Ok(Self {
            repos,
            clock,
            connector,
            policies,
            collector,
            scorer,
            claims,
            scheduler,
            dispatcher,
            batch_size: config.dispatch.batch_size,
        })
    }

    /// Mirror claims of every repository, sweep, then deliver pending actions.
    ///
    /// A repository that cannot be listed is skipped; its assignments are
    /// still swept.
    pub async fn tick(&self) -> DomainResult<TickReport> {
        self.run(true).await
    }

    /// Like [`Engine::tick`], leaving queued actions undelivered unless
    /// `dispatch` is set.
    pub async fn run(&self, dispatch: bool) -> DomainResult<TickReport> {
        let mut report = TickReport::default();

        for repo in self.repos.repos.list().await? {
            match self.claims.observe_claims(repo.id).await {
                Ok(claims) => {
                    report.repos_observed += 1;
                    report.claims.absorb(&claims);
                }
                Err(e) => {
                    report.repos_failed += 1;
                    tracing::warn!(repo = %repo.slug(), error = %e, "claim observation failed");
                }
            }
        }

        report.sweep = self.scheduler.sweep().await?;
        if dispatch {
            report.dispatch = self.dispatcher.dispatch_pending(self.batch_size).await?;
        }
        Ok(report)
    }
}
