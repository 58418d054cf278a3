pub mod assignment;
pub mod config;
pub mod contributor;
pub mod issue;
pub mod outbound;
pub mod policy;
pub mod repo;
pub mod signal;

pub use assignment::{Assignment, AssignmentState};
pub use config::{
    Config, DatabaseConfig, DispatchConfig, GitHubConfig, LoggingConfig, RetryConfig,
    SchedulerConfig, ScoringConfig, ServerConfig, TrustScalingConfig,
};
pub use contributor::{Contributor, NEUTRAL_TRUST};
pub use issue::{Issue, IssueRef, IssueState, PlatformIssue};
pub use outbound::{ActionKind, ActionStatus, OutboundAction};
pub use policy::{PolicyOverride, ReminderPolicy};
pub use repo::Repo;
pub use signal::{sort_timeline, ActivitySignal, PlatformEvent, SignalKind};
