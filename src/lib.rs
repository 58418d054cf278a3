//! Claimwatch - abandoned issue claim detection
//!
//! Claimwatch watches issue assignments on a code-hosting platform, scores
//! contributors by how reliably they finish what they claim, and escalates
//! silent claims through reminders and a final warning to reassignment.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): state machine, scoring, scheduling and delivery
//! - **Adapters** (`adapters`): SQLite persistence, GitHub connector, read API
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use claimwatch::adapters::sqlite::{initialize_database, repositories};
//! use claimwatch::services::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = claimwatch::ConfigLoader::load()?;
//!     let pool = initialize_database(&config.database.url(), None).await?;
//!     let engine = Engine::new(&config, repositories(pool), connector, clock)?;
//!     let report = engine.tick().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ActionKind, Assignment, AssignmentState, Config, Contributor, Issue, OutboundAction, PolicyOverride,
    ReminderPolicy, Repo, SignalKind,
};
pub use domain::ports::{Clock, ManualClock, PlatformConnector, Repositories, SystemClock};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Engine, EscalationDaemon, EscalationScheduler, TickReport, TrustScorer};
