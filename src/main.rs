//! Clusterbridge CLI entry point.

use clusterbridge::config::Config;
use clusterbridge::executor::KubectlExecutor;
use clusterbridge::messaging::{TeamsAdapter, TransportDyn};
use clusterbridge::router::Bot;

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clusterbridge")]
#[command(about = "Microsoft Teams bridge for cluster commands and notifications")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting clusterbridge");

    let config = match &cli.config {
        Some(config_path) => Config::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?,
        None => Config::load().context("failed to load configuration from environment")?,
    };
    let bind = config.listen_addr()?;
    tracing::info!(
        app_id = %config.app_id,
        cluster = %config.cluster_name,
        allow_kubectl = config.allow_kubectl,
        "configuration loaded"
    );

    let transport: Arc<dyn TransportDyn> = Arc::new(
        TeamsAdapter::new(config.app_id.clone(), config.request_timeout())
            .context("failed to build Teams adapter")?,
    );
    let executor = Arc::new(KubectlExecutor::from_config(&config));
    let bot = Arc::new(Bot::new(&config, transport, executor).context("failed to build bot")?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = clusterbridge::server::start_http_server(
        bind,
        bot,
        &config.message_path,
        shutdown_rx,
    )
    .await
    .with_context(|| format!("failed to bind {bind}"))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(error) = server.await {
        tracing::error!(%error, "server task failed");
    }

    tracing::info!("clusterbridge stopped");
    Ok(())
}
