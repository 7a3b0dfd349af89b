use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sc_common::logging::init_logging;
use sc_config::NodeConfig;
use sc_vm::{ProcessorCache, TaskRunner, TaskScheduler};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Smart-contract committee node")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = NodeConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
        None => NodeConfig::load().context("loading configuration")?,
    };
    if args.verbose {
        config.log_level = "debug".to_string();
    }

    init_logging(&config.log_level, config.log_dir.as_deref(), &config.node_id)?;
    info!("Starting node {}", config.node_id);

    let cache = Arc::new(ProcessorCache::with_defaults()?);
    let runner = TaskRunner::new(cache, config.vm.execution_timeout());
    let scheduler = TaskScheduler::new(runner, config.vm.max_concurrent_tasks);
    info!(
        "VM ready: {} concurrent tasks, timeout {:?}",
        config.vm.max_concurrent_tasks,
        config.vm.execution_timeout()
    );

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("can't listen for shutdown signal: {}", e);
            }
        })
        .await;

    info!("Node {} stopped", config.node_id);
    Ok(())
}
