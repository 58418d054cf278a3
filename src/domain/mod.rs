//! Domain layer for the claimwatch engine
//!
//! This module contains core models, errors and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ConnectorError, ConnectorResult, DomainError, DomainResult};
