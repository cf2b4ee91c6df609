//! Data gateway binary.
//!
//! Loads configuration, builds the application context, serves the admin
//! API, runs the warm-up job and shuts everything down in order on SIGINT or
//! SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use data_gateway::admin::setup_admin_router;
use data_gateway::cache::MemoryStore;
use data_gateway::config::{load_config, GatewayConfig};
use data_gateway::lifecycle::wait_for_signal;
use data_gateway::observability::{logging, metrics};
use data_gateway::providers::HttpJsonProvider;
use data_gateway::warmup::WarmupJob;
use data_gateway::AppContext;

const STORE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "data-gateway")]
#[command(about = "Resilient access layer for rate-limited data upstreams", long_about = None)]
struct Args {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "DATA_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "data-gateway starting");
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Configuration loaded");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = MemoryStore::new();
    let ctx = Arc::new(AppContext::new(config, Arc::new(store.clone())));
    let sweeper = store.spawn_sweeper(STORE_SWEEP_INTERVAL, ctx.shutdown().subscribe());

    let warmup = if ctx.config().warmup.enabled {
        let job = WarmupJob::from_config(ctx.clone(), &HttpJsonProvider::new());
        Some(tokio::spawn(job.run(ctx.shutdown().subscribe())))
    } else {
        tracing::info!("Warm-up job disabled");
        None
    };

    let admin = if ctx.config().admin.enabled {
        let listener = TcpListener::bind(&ctx.config().admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(ctx.clone());
        let mut stop = ctx.shutdown().subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    wait_for_signal().await;
    ctx.shutdown().trigger();

    if let Some(handle) = warmup {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Warm-up task ended abnormally");
        }
    }
    if let Some(handle) = admin {
        match handle.await {
            Ok(Ok(())) => tracing::info!("Admin API stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin task ended abnormally"),
        }
    }
    let _ = sweeper.await;
    ctx.close_upstreams();

    tracing::info!("Shutdown complete");
    Ok(())
}
