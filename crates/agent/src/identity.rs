//! Agent identity and self-description.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Error;

/// Identifying attribute: the agent type.
pub const SERVICE_NAME: &str = "service.name";
/// Identifying attribute: the agent version.
pub const SERVICE_VERSION: &str = "service.version";
/// Non-identifying attribute: operating system family.
pub const OS_FAMILY: &str = "os.family";
/// Non-identifying attribute: host name.
pub const HOST_NAME: &str = "host.name";

/// Globally unique, time-sortable instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentIdentity(Ulid);

impl AgentIdentity {
    /// Create a new identity from the current time and random entropy.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for AgentIdentity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(value)
            .map(Self)
            .map_err(|e| Error::invalid_identity(value, e.to_string()))
    }
}

impl std::fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes the agent reports about itself at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescription {
    /// Attributes that identify the agent (type and version).
    pub identifying_attributes: BTreeMap<String, String>,
    /// Informational attributes (OS family, host name).
    pub non_identifying_attributes: BTreeMap<String, String>,
}

impl AgentDescription {
    /// Describe this process as an agent of the given type and version.
    pub fn new(agent_type: impl Into<String>, agent_version: impl Into<String>) -> Self {
        let identifying_attributes = BTreeMap::from([
            (SERVICE_NAME.to_string(), agent_type.into()),
            (SERVICE_VERSION.to_string(), agent_version.into()),
        ]);

        let non_identifying_attributes = BTreeMap::from([
            (OS_FAMILY.to_string(), std::env::consts::OS.to_string()),
            (HOST_NAME.to_string(), host_name()),
        ]);

        Self {
            identifying_attributes,
            non_identifying_attributes,
        }
    }

    /// Look up an attribute in either set.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.identifying_attributes
            .get(key)
            .or_else(|| self.non_identifying_attributes.get(key))
            .map(String::as_str)
    }
}

/// Host name from the OS, falling back to `$HOSTNAME` (set in pods).
fn host_name() -> String {
    sysinfo::System::host_name()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_default()
}
