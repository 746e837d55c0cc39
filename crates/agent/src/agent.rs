//! The message-handling loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use incluster_core::AgentConfig;
use incluster_reconciler::{ReconcileOutcome, Reconciler, decode_descriptor};
use itertools::Itertools;
use tracing::{debug, error, info, warn};

use crate::channel::ControlChannel;
use crate::dedup::ContentDeduper;
use crate::error::Result;
use crate::identity::{AgentDescription, AgentIdentity};
use crate::message::{
    ConfigurationItem, EffectiveConfig, ReconciliationStatus, RemoteConfig, RemoteConfigStatus,
    ServerMessage,
};

/// What handling one [`ServerMessage`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    /// Items reconciled successfully, in processing order.
    pub applied: Vec<String>,
    /// Items whose content was already applied.
    pub skipped: Vec<String>,
    /// Items that failed to decode or reconcile.
    pub failed: Vec<String>,
    /// Status reported for the bundle, if the message carried one.
    pub status: Option<RemoteConfigStatus>,
    /// Whether the agent identity was replaced.
    pub identity_changed: bool,
}

impl MessageOutcome {
    /// Whether any item changed the effective configuration.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Remote-configuration agent.
///
/// Messages are handled one at a time through `&mut self`, so the seen set
/// and identity never need locking.
pub struct Agent {
    identity: AgentIdentity,
    description: AgentDescription,
    deduper: ContentDeduper,
    reconciler: Arc<Reconciler>,
    channel: Arc<dyn ControlChannel>,
    effective: BTreeMap<String, ConfigurationItem>,
    remote_config_status: Option<RemoteConfigStatus>,
}

impl Agent {
    /// Create an agent with a fresh identity and an empty seen set.
    pub fn new(
        config: &AgentConfig,
        reconciler: Arc<Reconciler>,
        channel: Arc<dyn ControlChannel>,
    ) -> Self {
        Self {
            identity: AgentIdentity::new(),
            description: AgentDescription::new(&config.agent_type, &config.agent_version),
            deduper: ContentDeduper::new(),
            reconciler,
            channel,
            effective: BTreeMap::new(),
            remote_config_status: None,
        }
    }

    /// Announce the agent upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel rejects the description.
    pub async fn start(&self) -> Result<()> {
        info!(
            identity = %self.identity,
            service = ?self.description.identifying_attributes,
            "Starting agent"
        );
        self.channel
            .set_agent_description(self.identity, &self.description)
            .await
    }

    /// Handle one message from the control channel.
    ///
    /// Never fails: item failures are reported upstream in the bundle status
    /// and leave the item retryable on the next delivery.
    pub async fn on_message(&mut self, message: ServerMessage) -> MessageOutcome {
        let mut outcome = MessageOutcome::default();

        if let Some(remote) = &message.remote_config {
            self.apply_remote_config(remote, &mut outcome).await;
        }

        if let Some(identification) = &message.agent_identification {
            outcome.identity_changed = self.replace_identity(&identification.new_instance_uid);
        }

        if outcome.changed() {
            self.publish_effective_config().await;
        }

        outcome
    }

    async fn apply_remote_config(&mut self, remote: &RemoteConfig, outcome: &mut MessageOutcome) {
        debug!(
            hash = %remote.config_hash,
            items = remote.config.len(),
            "Received remote configuration"
        );

        let mut failures = Vec::new();
        for (name, item) in remote.config.ordered_items() {
            if self.deduper.seen(item.body.as_bytes()) {
                debug!(item = name, "Configuration item already applied, skipping");
                outcome.skipped.push(name.to_string());
                continue;
            }

            match self.apply_item(item).await {
                Ok(result) => {
                    let fingerprint = self.deduper.record(item.body.as_bytes());
                    self.effective.insert(name.to_string(), item.clone());
                    info!(
                        item = name,
                        resource = result.name(),
                        %fingerprint,
                        "Applied configuration item"
                    );
                    outcome.applied.push(name.to_string());
                }
                Err(e) => {
                    warn!(item = name, error = %e, "Failed to apply configuration item");
                    failures.push(format!("{}: {e}", item_label(name)));
                    outcome.failed.push(name.to_string());
                }
            }
        }

        let status = if failures.is_empty() {
            ReconciliationStatus::Applied
        } else {
            ReconciliationStatus::Failed {
                reason: failures.iter().join("; "),
            }
        };
        let status = RemoteConfigStatus {
            last_remote_config_hash: remote.config_hash.clone(),
            status,
        };

        if let Err(e) = self.channel.set_remote_config_status(&status).await {
            error!(hash = %remote.config_hash, error = %e, "Failed to report remote config status");
        }
        self.remote_config_status = Some(status.clone());
        outcome.status = Some(status);
    }

    async fn apply_item(&self, item: &ConfigurationItem) -> Result<ReconcileOutcome> {
        let desired = decode_descriptor(item.body.as_bytes(), &item.content_type)?;
        Ok(self.reconciler.reconcile(&desired).await?)
    }

    fn replace_identity(&mut self, value: &str) -> bool {
        match value.parse::<AgentIdentity>() {
            Ok(identity) => {
                info!(old = %self.identity, new = %identity, "Agent identity replaced");
                self.identity = identity;
                true
            }
            Err(e) => {
                error!(error = %e, "Ignoring invalid agent identity");
                false
            }
        }
    }

    async fn publish_effective_config(&self) {
        let config = self.effective_config();
        if let Err(e) = self.channel.update_effective_config(&config).await {
            error!(error = %e, "Failed to publish effective configuration");
        }
    }

    /// Close the control channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel fails to stop.
    pub async fn shutdown(&self) -> Result<()> {
        info!(identity = %self.identity, "Stopping agent");
        self.channel.stop().await
    }

    /// Current instance identity.
    pub const fn identity(&self) -> AgentIdentity {
        self.identity
    }

    /// Attributes reported at startup.
    pub const fn description(&self) -> &AgentDescription {
        &self.description
    }

    /// Fingerprints of applied payloads.
    pub const fn deduper(&self) -> &ContentDeduper {
        &self.deduper
    }

    /// Last successfully applied item per name.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            config_map: self.effective.clone(),
        }
    }

    /// The last bundle status reported upstream.
    pub const fn remote_config_status(&self) -> Option<&RemoteConfigStatus> {
        self.remote_config_status.as_ref()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("seen", &self.deduper.len())
            .field("effective", &self.effective.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn item_label(name: &str) -> &str {
    if name.is_empty() { "<instance>" } else { name }
}
