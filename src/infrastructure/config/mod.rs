//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Policy-only reload for the daemon

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
