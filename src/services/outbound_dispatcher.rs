//! Delivers queued reminders, warnings and reassignment requests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionKind, DispatchConfig, OutboundAction};
use crate::domain::ports::{Clock, PlatformConnector, Repositories};
use crate::services::signal_collector::SignalCollector;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub attempted: u64,
    pub delivered: u64,
    /// Failed this time, left pending for the next tick.
    pub retrying: u64,
    /// Failed for good.
    pub failed: u64,
    /// Dropped because the assignment changed after they were queued.
    #[serde(default)]
    pub obsolete: u64,
}

/// Result of handling one queued action.
enum Delivery {
    Sent,
    Superseded { version: u64 },
}

/// Comment body for a reminder or warning.
pub fn render(kind: ActionKind, login: &str) -> String {
    match kind {
        ActionKind::Reminder => format!(
            "Hi @{login}, this issue is assigned to you but has not seen any activity for a while. \
             Are you still working on it? A quick update keeps the assignment, and unassigning \
             yourself is fine if your plans changed."
        ),
        ActionKind::Warning => format!(
            "@{login}, final reminder: without activity soon this issue will be unassigned \
             so that other contributors can pick it up."
        ),
        ActionKind::Reassignment => format!(
            "This issue has been unassigned from @{login} after a period of inactivity \
             and is open for other contributors again."
        ),
    }
}

pub struct OutboundDispatcher {
    repos: Repositories,
    collector: Arc<SignalCollector>,
    connector: Arc<dyn PlatformConnector>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

impl OutboundDispatcher {
    pub fn new(
        repos: Repositories,
        collector: Arc<SignalCollector>,
        connector: Arc<dyn PlatformConnector>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            repos,
            collector,
            connector,
            clock,
            config,
        }
    }

    /// Deliver up to `limit` pending actions, oldest first.
    pub async fn dispatch_pending(&self, limit: usize) -> DomainResult<DispatchReport> {
        let pending = self.repos.outbound.list_pending(limit).await?;
        let mut report = DispatchReport::default();

        for action in pending {
            report.attempted += 1;
            match self.deliver(&action).await {
                Ok(Delivery::Superseded { version }) => {
                    self.repos
                        .outbound
                        .mark_obsolete(action.id, &format!("assignment is at version {version}"))
                        .await?;
                    report.obsolete += 1;
                    tracing::info!(
                        action_id = %action.id,
                        assignment_id = %action.assignment_id,
                        kind = action.kind.as_str(),
                        queued_at_version = action.sequence,
                        version,
                        "outbound action superseded, not sent"
                    );
                }
                Ok(Delivery::Sent) => {
                    self.repos.outbound.mark_delivered(action.id, self.clock.now()).await?;
                    report.delivered += 1;
                    tracing::info!(
                        action_id = %action.id,
                        assignment_id = %action.assignment_id,
                        kind = action.kind.as_str(),
                        "outbound action delivered"
                    );
                }
                Err(e) => {
                    let retryable = matches!(&e, DomainError::Connector(c) if c.is_transient());
                    let give_up = !retryable || action.attempts + 1 >= self.config.max_delivery_attempts;
                    self.repos
                        .outbound
                        .record_failure(action.id, &e.to_string(), give_up)
                        .await?;
                    if give_up {
                        report.failed += 1;
                        tracing::error!(
                            action_id = %action.id,
                            kind = action.kind.as_str(),
                            attempts = action.attempts + 1,
                            error = %e,
                            "outbound action failed permanently"
                        );
                    } else {
                        report.retrying += 1;
                        tracing::warn!(
                            action_id = %action.id,
                            kind = action.kind.as_str(),
                            attempts = action.attempts + 1,
                            error = %e,
                            "outbound delivery failed, will retry"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, action: &OutboundAction) -> DomainResult<Delivery> {
        let assignment = self
            .repos
            .assignments
            .get(action.assignment_id)
            .await?
            .ok_or(DomainError::AssignmentNotFound(action.assignment_id))?;
        // Any commit after the one that queued a nudge (new activity, another
        // reminder, termination) makes it stale. A reassignment is queued by
        // the terminal commit, which nothing follows.
        if action.kind != ActionKind::Reassignment && assignment.version != action.sequence {
            return Ok(Delivery::Superseded {
                version: assignment.version,
            });
        }
        let contributor = self
            .repos
            .contributors
            .get(assignment.contributor_id)
            .await?
            .ok_or_else(|| DomainError::ContributorNotFound(assignment.contributor_id.to_string()))?;
        let (_, issue_ref) = self.collector.issue_ref(action.issue_id).await?;

        match action.kind {
            ActionKind::Reminder | ActionKind::Warning => {
                let body = render(action.kind, &contributor.login);
                self.connector.post_comment(&issue_ref, &body).await?;
            }
            ActionKind::Reassignment => {
                self.connector
                    .request_reassignment(&issue_ref, &contributor.login)
                    .await?;
                let body = render(action.kind, &contributor.login);
                if let Err(e) = self.connector.post_comment(&issue_ref, &body).await {
                    tracing::warn!(issue = %issue_ref, error = %e, "reassignment notice not posted");
                }
            }
        }
        Ok(Delivery::Sent)
    }
}
