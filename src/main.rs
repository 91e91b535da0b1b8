//! Cipher Wheel Server
//!
//! Deploys the ledger and the wheel over the reference backend and serves
//! them over WebSocket until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cipher_wheel::{
    host::{Runtime, RuntimeConfig, SystemClock},
    network::{ServerConfig, WheelServer},
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Cipher Wheel Server v{}", VERSION);

    let runtime_config = RuntimeConfig::from_env();
    if runtime_config.rng_seed.is_some() {
        warn!("WHEEL_RNG_SEED set: outcomes are reproducible");
    }
    let runtime = Runtime::with_clear_backend(runtime_config, Arc::new(SystemClock))
        .context("failed to deploy contracts")?;
    info!(
        ledger = %runtime.ledger().address(),
        wheel = %runtime.wheel().address(),
        mode = %runtime.wheel().mode(),
        "runtime ready"
    );

    let server_config = ServerConfig::from_env();
    if server_config.auth.insecure_dev {
        warn!("development tokens enabled; do not expose this server");
    } else if !server_config.auth.is_configured() {
        warn!("no JWT key configured; every authentication will fail");
    }

    let server = WheelServer::new(server_config, runtime);
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown.send(());
        }
    });

    server.run().await.context("server failed")?;

    let runtime = server.runtime();
    let runtime = runtime.lock().await;
    info!(
        transactions = runtime.journal().len(),
        state_hash = %hex::encode(runtime.state_hash()),
        "server stopped"
    );
    Ok(())
}
