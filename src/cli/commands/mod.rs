//! CLI command implementations.

pub mod claim;
pub mod contributors;
pub mod init;
pub mod repo;
pub mod serve;
pub mod stats;
pub mod sweep;
