//! Proxy rotator service.
//!
//! Serves the pool over HTTP; see `proxy_rotator::server` for the routes.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use proxy_rotator::{seed, server, ProxyPool, ProxyPoolConfig, ProxySelectionStrategy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Random,
    RoundRobin,
}

impl From<Strategy> for ProxySelectionStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Random => ProxySelectionStrategy::Random,
            Strategy::RoundRobin => ProxySelectionStrategy::RoundRobin,
        }
    }
}

#[derive(Parser)]
#[command(name = "proxy-rotator")]
#[command(about = "Rotating proxy pool service", long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "ROTATOR_LISTEN", default_value = "0.0.0.0:8081")]
    listen: SocketAddr,

    /// Consecutive failures before a proxy is taken out of rotation.
    #[arg(long, env = "ROTATOR_FAILURE_THRESHOLD", default_value_t = 3)]
    failure_threshold: u32,

    /// Seconds an inactive proxy must sit idle before it may be reactivated.
    #[arg(long, env = "ROTATOR_COOLDOWN_SECS", default_value_t = 300)]
    cooldown_secs: u64,

    /// How proxies are picked among the active ones.
    #[arg(long, env = "ROTATOR_STRATEGY", value_enum, default_value_t = Strategy::Random)]
    strategy: Strategy,

    /// Append on add instead of updating an existing proxy with the same host and port.
    #[arg(long, env = "ROTATOR_NO_UPSERT")]
    no_upsert: bool,

    /// File with one proxy per line to load at startup.
    #[arg(long, env = "ROTATOR_SEED")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ProxyPoolConfig::builder()
        .failure_threshold(args.failure_threshold)
        .reactivation_cooldown(Duration::from_secs(args.cooldown_secs))
        .selection_strategy(args.strategy.into())
        .upsert_on_add(!args.no_upsert)
        .build();
    info!(
        "Pool configured: threshold {}, cooldown {}s, strategy {:?}, upsert {}",
        config.failure_threshold,
        config.reactivation_cooldown.as_secs(),
        config.selection_strategy,
        config.upsert_on_add
    );

    let pool = Arc::new(ProxyPool::new(config));
    if let Some(path) = &args.seed {
        let proxies = seed::load_proxy_list(path)
            .with_context(|| format!("failed to read seed list {}", path.display()))?;
        let added = pool.extend(proxies);
        info!("Seeded {} proxies from {}", added, path.display());
    }

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind to {}", args.listen))?;
    info!("Starting proxy rotator service on {}", args.listen);

    server::serve(listener, pool, shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt, shutting down"),
        Err(e) => {
            warn!("Failed to listen for interrupt, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
