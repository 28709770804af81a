//! Gateway operator (v1)
//!
//! Watches declarative gateway resources and pushes one consolidated
//! configuration per stage downstream.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                   GATEWAY OPERATOR                   │
//!                  │                                                      │
//!   Registry       │  ┌────────────┐   ┌────────────┐   ┌──────────────┐  │
//!   watch ─────────┼─▶│   agent    │──▶│   timer    │──▶│   commiter   │  │
//!                  │  │ event loop │   │  debounce  │   │  segments    │  │
//!                  │  └─────┬──────┘   └────────────┘   └──────┬───────┘  │
//!                  │        │                                  │          │
//!                  │        ▼                                  ▼          │
//!                  │  ┌────────────┐                   ┌──────────────┐   │
//!                  │  │ radixtree  │                   │   convert    │   │
//!                  │  │ SNI → cert │                   │ synchronizer │───┼──▶ Data plane
//!                  │  └────────────┘                   └──────────────┘   │
//!                  │                                                      │
//!                  │  config · observability · lifecycle                  │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use gateway_operator::agent::{EventAgent, StageTimer};
use gateway_operator::commiter::{commit_channel, Commiter, LogReporter, StageCommitter};
use gateway_operator::config::{load_config, OperatorConfig};
use gateway_operator::convert::DefaultConverter;
use gateway_operator::lifecycle::{signals, Shutdown};
use gateway_operator::observability::logging;
use gateway_operator::radixtree::new_getter;
use gateway_operator::registry::MemoryRegistry;
use gateway_operator::synchronizer::FileSynchronizer;

#[derive(Parser)]
#[command(name = "gateway-operator")]
#[command(about = "Reconcile gateway resources into per-stage configuration")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => OperatorConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("gateway-operator v0.1.0 starting");
    tracing::info!(
        per_stage_tree = config.tls.per_stage_tree,
        segment_size = config.commiter.segment_size,
        output_dir = ?config.synchronizer.output_dir,
        "Configuration loaded"
    );

    let registry = Arc::new(match &config.registry.seed_file {
        Some(path) => MemoryRegistry::load_from_file(path)?,
        None => MemoryRegistry::new(),
    });
    let synchronizer = Arc::new(FileSynchronizer::new(config.synchronizer.output_dir.clone()));
    let timer = Arc::new(StageTimer::from_config(&config.agent));
    let trees = new_getter(config.tls.per_stage_tree);

    let (commit_tx, commit_rx) = commit_channel(config.commiter.channel_capacity);
    let committer = Arc::new(StageCommitter::new(
        registry.clone(),
        Arc::new(DefaultConverter::new()),
        synchronizer.clone(),
        timer.clone(),
        Arc::new(LogReporter),
    ));

    let shutdown = Shutdown::new();
    let commiter = Commiter::new(committer, commit_rx, config.commiter.segment_size);
    let commiter_handle = tokio::spawn(commiter.run(shutdown.subscribe()));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let agent = EventAgent::new(
        registry,
        synchronizer,
        commit_tx,
        timer,
        trees,
        config.agent.clone(),
    );
    let result = agent.run(shutdown.subscribe()).await;

    shutdown.trigger();
    if let Err(e) = commiter_handle.await {
        tracing::error!(error = %e, "Commiter task failed");
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "Event agent stopped");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
