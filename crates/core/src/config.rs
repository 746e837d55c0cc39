//! Configuration for the in-cluster agent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`AgentConfig::namespace`].
pub const ENV_NAMESPACE: &str = "INCLUSTER_NAMESPACE";
/// Environment variable overriding [`AgentConfig::log_filter`].
pub const ENV_LOG: &str = "INCLUSTER_LOG";
/// Environment variable overriding [`AgentConfig::dry_run`].
pub const ENV_DRY_RUN: &str = "INCLUSTER_DRY_RUN";

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Reported as the `service.name` identifying attribute.
    #[serde(default = "default_agent_type")]
    pub agent_type: String,

    /// Reported as the `service.version` identifying attribute.
    #[serde(default = "default_agent_version")]
    pub agent_version: String,

    /// Namespace used when a resource descriptor names none.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Reconcile against an in-memory orchestrator instead of a cluster.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: default_agent_type(),
            agent_version: default_agent_version(),
            namespace: default_namespace(),
            log_filter: default_log_filter(),
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed,
    /// or if the resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        tracing::debug!(
            path = ?path,
            namespace = %config.namespace,
            dry_run = config.dry_run,
            "Loaded agent configuration"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML for this schema.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }

    /// Apply overrides looked up by environment variable name.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            self.namespace = namespace;
        }

        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }

        if let Some(flag) = lookup(ENV_DRY_RUN) {
            self.dry_run = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        self
    }

    /// Set the default namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enable dry-run mode.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Check that required values are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first empty required field.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::invalid_config("namespace must not be empty"));
        }
        if self.agent_type.trim().is_empty() {
            return Err(Error::invalid_config("agent_type must not be empty"));
        }
        Ok(())
    }
}

fn default_agent_type() -> String {
    "io.opentelemetry.collector".to_string()
}

fn default_agent_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}
