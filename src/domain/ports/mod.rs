//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - Entity repositories: persistence of contributors, repositories, issues,
//!   assignments, signals and the outbound action queue
//! - PlatformConnector: the code-hosting platform
//! - Clock: the time source driving escalation deadlines

pub mod assignment_repository;
pub mod clock;
pub mod contributor_repository;
pub mod issue_repository;
pub mod outbound_repository;
pub mod platform_connector;
pub mod repo_repository;
pub mod signal_repository;

pub use assignment_repository::{AssignmentFilter, AssignmentRepository};
pub use clock::{Clock, ManualClock, SystemClock};
pub use contributor_repository::{ContributorFilter, ContributorRepository};
pub use issue_repository::{IssueFilter, IssueRepository};
pub use outbound_repository::OutboundActionRepository;
pub use platform_connector::PlatformConnector;
pub use repo_repository::RepoRepository;
pub use signal_repository::SignalRepository;

use std::sync::Arc;

/// The persistence ports the engine works against, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub contributors: Arc<dyn ContributorRepository>,
    pub repos: Arc<dyn RepoRepository>,
    pub issues: Arc<dyn IssueRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub signals: Arc<dyn SignalRepository>,
    pub outbound: Arc<dyn OutboundActionRepository>,
}
