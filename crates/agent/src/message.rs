//! Protocol-neutral control channel messages.
//!
//! These mirror what an OpAMP-style server exchanges with an agent: remote
//! configuration bundles and identity reassignments inbound, status and
//! effective configuration outbound.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque hash the server assigns to a configuration bundle.
///
/// Serialized as a lowercase hex string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConfigHash(Vec<u8>);

impl ConfigHash {
    /// Wrap raw hash bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<ConfigHash> for String {
    fn from(hash: ConfigHash) -> Self {
        hex::encode(hash.0)
    }
}

impl TryFrom<String> for ConfigHash {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        hex::decode(value).map(Self)
    }
}

impl std::fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// One delivered configuration file; its name is its key in the bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItem {
    /// Payload text; fingerprinted and decoded as its UTF-8 bytes.
    #[serde(default)]
    pub body: String,
    /// Declared media type, e.g. `application/json` or `application/yaml`.
    #[serde(default)]
    pub content_type: String,
}

impl ConfigurationItem {
    /// Create an item from a payload and content type.
    pub fn new(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}

/// Named configuration items delivered together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBundle {
    #[serde(default)]
    pub config_map: BTreeMap<String, ConfigurationItem>,
}

impl ConfigBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item under a name.
    #[must_use]
    pub fn with_item(mut self, name: impl Into<String>, item: ConfigurationItem) -> Self {
        self.config_map.insert(name.into(), item);
        self
    }

    /// Items sorted by name, with the instance item (empty name) last.
    pub fn ordered_items(&self) -> impl Iterator<Item = (&str, &ConfigurationItem)> {
        self.config_map
            .iter()
            .filter(|(name, _)| !name.is_empty())
            .chain(self.config_map.get_key_value(""))
            .map(|(name, item)| (name.as_str(), item))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.config_map.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.config_map.is_empty()
    }
}

/// Remote configuration offered by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub config_hash: ConfigHash,
    #[serde(default)]
    pub config: ConfigBundle,
}

/// Server-issued replacement identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentification {
    pub new_instance_uid: String,
}

/// One inbound message from the control channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_config: Option<RemoteConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_identification: Option<AgentIdentification>,
}

impl ServerMessage {
    /// A message carrying only a remote configuration.
    pub fn remote_config(config_hash: ConfigHash, config: ConfigBundle) -> Self {
        Self {
            remote_config: Some(RemoteConfig {
                config_hash,
                config,
            }),
            agent_identification: None,
        }
    }

    /// Attach an identity reassignment.
    #[must_use]
    pub fn with_new_identity(mut self, new_instance_uid: impl Into<String>) -> Self {
        self.agent_identification = Some(AgentIdentification {
            new_instance_uid: new_instance_uid.into(),
        });
        self
    }
}

/// Outcome of applying a configuration bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Applied,
    Failed { reason: String },
}

impl ReconciliationStatus {
    /// Whether the bundle was applied.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Status report for the bundle identified by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigStatus {
    pub last_remote_config_hash: ConfigHash,
    pub status: ReconciliationStatus,
}

/// Configuration the agent is currently running with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub config_map: BTreeMap<String, ConfigurationItem>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_instance_item_is_ordered_last() {
        let bundle = ConfigBundle::new()
            .with_item("", ConfigurationItem::new("instance", "application/yaml"))
            .with_item("b", ConfigurationItem::new("b", "application/yaml"))
            .with_item("a", ConfigurationItem::new("a", "application/yaml"));

        let names: Vec<&str> = bundle.ordered_items().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", ""]);
    }

    #[test]
    fn test_server_message_from_json() {
        let json = r#"{
            "remoteConfig": {
                "configHash": "c0ffee",
                "config": {"configMap": {"": {"body": "receivers: {}", "contentType": "application/yaml"}}}
            },
            "agentIdentification": {"newInstanceUid": "01ARZ3NDEKTSV4RRFFQ69G5FAV"}
        }"#;

        let message: ServerMessage = serde_json::from_str(json).unwrap();
        let remote = message.remote_config.unwrap();

        assert_eq!(remote.config_hash.as_bytes(), &[0xc0, 0xff, 0xee]);
        assert_eq!(remote.config.config_map[""].body, "receivers: {}");
        assert_eq!(
            message.agent_identification.unwrap().new_instance_uid,
            "01ARZ3NDEKTSV4RRFFQ69G5FAV"
        );
    }

    #[test]
    fn test_bad_hash_is_rejected() {
        let json = r#"{"remoteConfig": {"configHash": "xyz"}}"#;
        assert!(serde_json::from_str::<ServerMessage>(json).is_err());
    }

    #[test]
    fn test_effective_config_body_is_written_verbatim() {
        let body = "exporters:\n  otlp:\n    endpoint: \"collector:4317\" # ü\n";
        let config = EffectiveConfig {
            config_map: BTreeMap::from([(
                String::new(),
                ConfigurationItem::new(body, "application/yaml"),
            )]),
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: EffectiveConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back, config);
        assert_eq!(back.config_map.get("").map(|item| item.body.as_str()), Some(body));
    }

    #[test]
    fn test_non_utf8_body_is_rejected_on_the_wire() {
        let mut json = br#"{"body": ""#.to_vec();
        json.extend_from_slice(&[0xff, 0xfe]);
        json.extend_from_slice(br#"", "contentType": "application/yaml"}"#);

        assert!(serde_json::from_slice::<ConfigurationItem>(&json).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let status = RemoteConfigStatus {
            last_remote_config_hash: ConfigHash::new(vec![0xab]),
            status: ReconciliationStatus::Failed {
                reason: "boom".to_string(),
            },
        };
        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(value["lastRemoteConfigHash"], "ab");
        assert_eq!(value["status"]["status"], "failed");
        assert_eq!(value["status"]["reason"], "boom");
    }
}
