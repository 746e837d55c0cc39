//! Core types shared by the in-cluster agent crates: the bootstrap error type
//! and the agent configuration.

pub mod config;
pub mod error;

pub use config::AgentConfig;
pub use error::{Error, Result};
