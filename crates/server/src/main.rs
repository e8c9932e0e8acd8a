// crates/server/src/main.rs
//! LADA job server binary.
//!
//! Serves the job API over the in-memory collaborators, seeded from
//! `LADA_SEED` or the built-in demo data.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use lada_core::memory::InMemoryStore;
use lada_server::{create_app, AppState, Config};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,lada_server=info,lada_server_jobs=info";

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let config = Config::parse();
    let seed = config.load_seed()?;
    let store = Arc::new(InMemoryStore::new(seed));

    let registry_config = config.registry_config();
    tracing::info!(
        workers = registry_config.worker_pool_size,
        retention_secs = registry_config.retention.as_secs(),
        result_dir = %registry_config.result_dir.display(),
        "Starting job registry"
    );
    let state = AppState::in_memory(store, registry_config, config.service_config());
    let registry = Arc::clone(&state.registry);
    let reaper = registry.spawn_reaper();

    let app = create_app(state);
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    eprintln!("\n  lada-server v{} on http://{}\n", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "Reaper task ended abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
