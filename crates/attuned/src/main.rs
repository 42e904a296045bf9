//! Attune Daemon - workload-aware resource orchestration.
//!
//! Detects what the machine is doing and continuously retunes shared
//! resources to suit it, learning which interventions help.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use attune_common::events::noop_emitter;
use attune_common::memory::MemorySystem;
use attuned::agents::AgentRegistry;
use attuned::backend::LoggingBackend;
use attuned::config::AttuneConfig;
use attuned::orchestrator::Orchestrator;
use attuned::providers::SysinfoProvider;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ATTUNE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Attune daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = AttuneConfig::load()?;
    let backend = Arc::new(LoggingBackend::new());
    let provider = Arc::new(SysinfoProvider::new());
    let registry = AgentRegistry::standard(backend, &config.signatures);
    let memory = Arc::new(MemorySystem::new(config.max_attention_vectors));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Cancellation requested");
        let _ = cancel_tx.send(true);
    });

    let mut orchestrator = Orchestrator::new(config, provider, registry, memory, noop_emitter());
    orchestrator.run(cancel_rx).await;

    let status = orchestrator.status();
    info!(
        "Shutting down gracefully: {} cycles run, {} skipped",
        status.cycles_run, status.cycles_skipped
    );
    Ok(())
}
