//! Remote-configuration agent loop.
//!
//! The [`Agent`] receives configuration bundles from a [`ControlChannel`],
//! gates each item through the [`ContentDeduper`] so identical content is
//! never applied twice, drives the reconciler for unseen items, and reports
//! the outcome and any effective-configuration change back upstream.

pub mod agent;
pub mod channel;
pub mod dedup;
pub mod error;
pub mod identity;
pub mod message;

pub use agent::{Agent, MessageOutcome};
pub use channel::{ChannelLog, ControlChannel, RecordingChannel};
pub use dedup::{ContentDeduper, Fingerprint};
pub use error::{Error, Result};
pub use identity::{AgentDescription, AgentIdentity};
pub use message::{
    AgentIdentification, ConfigBundle, ConfigHash, ConfigurationItem, EffectiveConfig,
    ReconciliationStatus, RemoteConfig, RemoteConfigStatus, ServerMessage,
};
