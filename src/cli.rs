//! CLI flag definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::Parser;
use incluster_core::AgentConfig;

/// In-cluster configuration agent
#[derive(Parser, Debug, Default)]
#[command(name = "incluster")]
#[command(version)]
#[command(about = "Reconciles remotely delivered configuration into an OpenTelemetryCollector")]
#[command(
    long_about = "Reads server messages as JSON lines on stdin, creates or updates the managed OpenTelemetryCollector resource, and writes status reports as JSON lines on stdout."
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Namespace used when a resource names none
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Reconcile against an in-memory orchestrator instead of the cluster
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Cli {
    /// Apply flag overrides on top of loaded configuration.
    #[must_use]
    pub fn apply(&self, config: AgentConfig) -> AgentConfig {
        let config = match &self.namespace {
            Some(namespace) => config.namespace(namespace.clone()),
            None => config,
        };

        if self.dry_run { config.dry_run() } else { config }
    }
}
