//! Infrastructure adapters for external systems.

pub mod github;
pub mod http;
pub mod mock;
pub mod sqlite;
