//! Service layer: the claim lifecycle engine and its background daemon.

pub mod assignment_machine;
pub mod claim_service;
pub mod engine;
pub mod escalation_daemon;
pub mod escalation_scheduler;
pub mod outbound_dispatcher;
pub mod reminder_policy;
pub mod retry;
pub mod signal_collector;
pub mod stats;
pub mod trust_scorer;

pub use assignment_machine::{evaluate, terminate, Outcome};
pub use claim_service::{ClaimReport, ClaimService};
pub use engine::{Engine, TickReport};
pub use escalation_daemon::{DaemonConfig, DaemonEvent, DaemonHandle, DaemonStatus, EscalationDaemon, StopReason};
pub use escalation_scheduler::{EscalationScheduler, SweepReport};
pub use outbound_dispatcher::{DispatchReport, OutboundDispatcher};
pub use reminder_policy::{ReminderPolicyTable, Thresholds};
pub use stats::Stats;
pub use signal_collector::{ObservedIssue, RepoSnapshot, SignalCollector};
pub use trust_scorer::{compute_trust, TrustScore, TrustScorer};
