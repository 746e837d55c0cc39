//! JSON-lines control channel over standard streams.

use async_trait::async_trait;
use incluster_agent::{
    AgentDescription, AgentIdentity, ControlChannel, EffectiveConfig, Error, RemoteConfigStatus,
    Result, ServerMessage,
};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// One outbound report line.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentReport<'a> {
    #[serde(rename_all = "camelCase")]
    Description {
        instance_uid: String,
        description: &'a AgentDescription,
    },
    RemoteConfigStatus(&'a RemoteConfigStatus),
    EffectiveConfig(&'a EffectiveConfig),
}

/// Writes reports as JSON lines to any async writer (stdout in production).
#[derive(Debug)]
pub struct StdioChannel<W> {
    writer: Mutex<W>,
}

impl<W> StdioChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a channel writing report lines to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    async fn send(&self, report: &AgentReport<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(report).map_err(|e| Error::channel(e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| Error::channel(e.to_string()))?;
        writer.flush().await.map_err(|e| Error::channel(e.to_string()))
    }

    /// Consume the channel, returning the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ControlChannel for StdioChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn set_agent_description(
        &self,
        identity: AgentIdentity,
        description: &AgentDescription,
    ) -> Result<()> {
        self.send(&AgentReport::Description {
            instance_uid: identity.to_string(),
            description,
        })
        .await
    }

    async fn set_remote_config_status(&self, status: &RemoteConfigStatus) -> Result<()> {
        self.send(&AgentReport::RemoteConfigStatus(status)).await
    }

    async fn update_effective_config(&self, config: &EffectiveConfig) -> Result<()> {
        self.send(&AgentReport::EffectiveConfig(config)).await
    }

    async fn stop(&self) -> Result<()> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| Error::channel(e.to_string()))
    }
}

/// Parse one inbound line; blank lines yield `None`.
///
/// # Errors
///
/// Returns the JSON error for a non-blank line that is not a server message.
pub fn parse_line(line: &str) -> serde_json::Result<Option<ServerMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use incluster_agent::{ConfigHash, ReconciliationStatus};

    use super::*;

    #[tokio::test]
    async fn test_reports_are_json_lines() {
        let channel = StdioChannel::new(Vec::new());
        let status = RemoteConfigStatus {
            last_remote_config_hash: ConfigHash::new(vec![0xbe, 0xef]),
            status: ReconciliationStatus::Applied,
        };

        channel.set_remote_config_status(&status).await.unwrap();
        channel
            .update_effective_config(&EffectiveConfig::default())
            .await
            .unwrap();

        let output = String::from_utf8(channel.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines.first().map(|l| l["type"].clone()),
            Some(serde_json::json!("remoteConfigStatus"))
        );
        assert_eq!(
            lines.first().map(|l| l["lastRemoteConfigHash"].clone()),
            Some(serde_json::json!("beef"))
        );
        assert_eq!(
            lines.last().map(|l| l["type"].clone()),
            Some(serde_json::json!("effectiveConfig"))
        );
    }

    #[tokio::test]
    async fn test_description_carries_identity() {
        let channel = StdioChannel::new(Vec::new());
        let identity = AgentIdentity::new();
        let description = AgentDescription::new("io.opentelemetry.collector", "0.1.0");

        channel
            .set_agent_description(identity, &description)
            .await
            .unwrap();

        let output = String::from_utf8(channel.into_inner()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(line["type"], "description");
        assert_eq!(line["instanceUid"], identity.to_string());
        assert_eq!(
            line["description"]["identifyingAttributes"]["service.name"],
            "io.opentelemetry.collector"
        );
    }

    #[test]
    fn test_parse_line() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("{not json").is_err());

        let message = parse_line(r#"{"agentIdentification": {"newInstanceUid": "x"}}"#)
            .unwrap()
            .unwrap();
        assert!(message.remote_config.is_none());
        assert!(message.agent_identification.is_some());
    }
}
