//! # incluster - In-Cluster Configuration Agent
//!
//! Entry point for the agent process.
//!
//! ## Startup Sequence
//!
//! 1. **Configuration** - Load the TOML file and environment overrides, then
//!    apply CLI flags
//! 2. **Tracing** - Install the subscriber on stderr (stdout carries reports)
//! 3. **Orchestrator** - Connect to the cluster, or use the in-memory
//!    orchestrator in dry-run mode
//! 4. **Agent** - Announce the agent and handle server messages from stdin
//!
//! ## Shutdown
//!
//! The agent stops on Ctrl+C or when stdin closes.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod stdio;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use incluster_agent::Agent;
use incluster_core::AgentConfig;
use incluster_reconciler::{InMemoryResourceApi, KubeResourceApi, Reconciler, ResourceApi};

use crate::cli::Cli;
use crate::stdio::StdioChannel;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AgentConfig::load(cli.config.as_deref())
        .context("Failed to load agent configuration")?;
    let config = cli.apply(config);
    config
        .validate()
        .context("Invalid agent configuration after applying flags")?;

    init_tracing(&config.log_filter);

    info!(
        version = %config.agent_version,
        namespace = %config.namespace,
        dry_run = config.dry_run,
        "incluster agent starting"
    );

    let api = init_api(&config).await?;
    let reconciler = Reconciler::builder()
        .with_api(api)
        .default_namespace(config.namespace.clone())
        .build()
        .context("Failed to build reconciler")?;

    let channel = Arc::new(StdioChannel::new(tokio::io::stdout()));
    let mut agent = Agent::new(&config, Arc::new(reconciler), channel);
    agent
        .start()
        .await
        .context("Failed to announce agent on the control channel")?;

    run(&mut agent).await;

    agent
        .shutdown()
        .await
        .context("Failed to close the control channel")?;
    info!("incluster agent stopped");
    Ok(())
}

/// Initialize tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(fallback: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Pick the orchestrator backend.
async fn init_api(config: &AgentConfig) -> Result<Arc<dyn ResourceApi>> {
    if config.dry_run {
        warn!("Dry run: reconciling against an in-memory orchestrator");
        let api: Arc<dyn ResourceApi> = InMemoryResourceApi::new_arc();
        return Ok(api);
    }

    let api = KubeResourceApi::try_default()
        .await
        .context("Failed to connect to the Kubernetes API")?;
    info!("Connected to the Kubernetes API");
    Ok(Arc::new(api))
}

/// Handle server messages until stdin closes or a shutdown signal arrives.
async fn run(agent: &mut Agent) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(agent, &line).await,
                Ok(None) => {
                    info!("Control channel closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from control channel");
                    break;
                }
            },
        }
    }
}

async fn handle_line(agent: &mut Agent, line: &str) {
    match stdio::parse_line(line) {
        Ok(Some(message)) => {
            let outcome = agent.on_message(message).await;
            debug!(
                applied = outcome.applied.len(),
                skipped = outcome.skipped.len(),
                failed = outcome.failed.len(),
                identity_changed = outcome.identity_changed,
                "Handled server message"
            );
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring malformed server message"),
    }
}

/// Wait for Ctrl+C. Without a signal handler only stdin EOF stops the agent.
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => {
            error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
