//! Repository port for the outbound action queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionStatus, OutboundAction};

#[async_trait]
pub trait OutboundActionRepository: Send + Sync {
    /// Oldest pending actions first.
    async fn list_pending(&self, limit: usize) -> DomainResult<Vec<OutboundAction>>;

    /// All actions queued for one assignment, oldest first.
    async fn list_for_assignment(&self, assignment_id: Uuid) -> DomainResult<Vec<OutboundAction>>;

    /// Mark an action delivered.
    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    /// Record a failed delivery attempt; `give_up` moves it to failed.
    async fn record_failure(&self, id: Uuid, error: &str, give_up: bool) -> DomainResult<()>;

    /// Settle an action that is no longer relevant without delivering it.
    async fn mark_obsolete(&self, id: Uuid, reason: &str) -> DomainResult<()>;

    /// Count actions per status.
    async fn count_by_status(&self) -> DomainResult<HashMap<ActionStatus, u64>>;
}
