//! Repository port for the append-only activity timeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ActivitySignal;

#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Append signals, skipping any whose dedup key is already recorded.
    ///
    /// Returns the number of newly recorded signals.
    async fn append(&self, signals: &[ActivitySignal]) -> DomainResult<usize>;

    /// The full timeline of an issue in canonical order.
    async fn timeline(&self, issue_id: Uuid) -> DomainResult<Vec<ActivitySignal>>;

    /// Timestamp of the newest recorded signal of an issue.
    async fn latest_occurred_at(&self, issue_id: Uuid) -> DomainResult<Option<DateTime<Utc>>>;
}
