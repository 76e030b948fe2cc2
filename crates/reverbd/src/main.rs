//! reverbd — chunk-reversal daemon.
//!
//! Accepts TCP connections and serves the INIT/AGRE, REQ_/ANS_ protocol,
//! reversing each submitted chunk. One task per connection, capped by
//! `limits.max_connections` from the config.

use anyhow::Result;
use tokio::sync::broadcast;

use reverb_core::config::ReverbConfig;
use reverb_net::Listener;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = ReverbConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ReverbConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ReverbConfig::default()
    });

    // Shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let listener = Listener::bind(&config, shutdown_tx.subscribe()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        max_connections = config.limits.max_connections,
        "reverbd listening"
    );

    listener.run().await
}
