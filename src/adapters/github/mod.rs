//! GitHub REST v3 adapter for the platform connector port.

pub mod client;
pub mod connector;
pub mod models;

pub use client::GitHubClient;
pub use connector::GitHubConnector;
