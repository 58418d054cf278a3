//! HTTP adapters.

pub mod read_api;

pub use read_api::{ReadApiServer, ReadApiState};
