//! Upstream reporting seam.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::identity::{AgentDescription, AgentIdentity};
use crate::message::{EffectiveConfig, RemoteConfigStatus};

/// Reports the agent sends back over the control channel.
///
/// Inbound messages are delivered by whoever owns the channel, by calling
/// [`Agent::on_message`](crate::Agent::on_message).
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Announce the agent and its attributes.
    async fn set_agent_description(
        &self,
        identity: AgentIdentity,
        description: &AgentDescription,
    ) -> Result<()>;

    /// Report the outcome of the last configuration bundle.
    async fn set_remote_config_status(&self, status: &RemoteConfigStatus) -> Result<()>;

    /// Publish the configuration the agent now runs with.
    async fn update_effective_config(&self, config: &EffectiveConfig) -> Result<()>;

    /// Close the channel.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Everything a [`RecordingChannel`] was sent.
#[derive(Debug, Clone, Default)]
pub struct ChannelLog {
    pub descriptions: Vec<(AgentIdentity, AgentDescription)>,
    pub statuses: Vec<RemoteConfigStatus>,
    pub effective_configs: Vec<EffectiveConfig>,
    pub stopped: bool,
}

/// In-memory control channel for testing.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    log: Mutex<ChannelLog>,
}

impl RecordingChannel {
    /// Create an empty recording channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub async fn log(&self) -> ChannelLog {
        self.log.lock().await.clone()
    }

    /// Status reports in the order they were sent.
    pub async fn statuses(&self) -> Vec<RemoteConfigStatus> {
        self.log.lock().await.statuses.clone()
    }

    /// The most recent status report.
    pub async fn last_status(&self) -> Option<RemoteConfigStatus> {
        self.log.lock().await.statuses.last().cloned()
    }
}

#[async_trait]
impl ControlChannel for RecordingChannel {
    async fn set_agent_description(
        &self,
        identity: AgentIdentity,
        description: &AgentDescription,
    ) -> Result<()> {
        self.log
            .lock()
            .await
            .descriptions
            .push((identity, description.clone()));
        Ok(())
    }

    async fn set_remote_config_status(&self, status: &RemoteConfigStatus) -> Result<()> {
        self.log.lock().await.statuses.push(status.clone());
        Ok(())
    }

    async fn update_effective_config(&self, config: &EffectiveConfig) -> Result<()> {
        self.log.lock().await.effective_configs.push(config.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.lock().await.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ConfigHash, ReconciliationStatus};

    #[tokio::test]
    async fn test_recording_channel_keeps_order() {
        let channel = RecordingChannel::new();
        for byte in [1_u8, 2] {
            let status = RemoteConfigStatus {
                last_remote_config_hash: ConfigHash::new(vec![byte]),
                status: ReconciliationStatus::Applied,
            };
            assert!(channel.set_remote_config_status(&status).await.is_ok());
        }

        let hashes: Vec<Vec<u8>> = channel
            .statuses()
            .await
            .iter()
            .map(|s| s.last_remote_config_hash.as_bytes().to_vec())
            .collect();
        assert_eq!(hashes, vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_stop_is_recorded() {
        let channel = RecordingChannel::new();
        assert!(channel.stop().await.is_ok());
        assert!(channel.log().await.stopped);
    }
}
