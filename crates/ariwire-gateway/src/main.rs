//! ariwire gateway binary.
//!
//! - Config: `ARIWIRE_CONFIG` (default `ariwire.yaml`), strict YAML
//! - Control listener (ARI events/REST over WebSocket) and media listener
//! - Optional control-plane client dialing out to `client.url`
//! - Ctrl-C stops everything and waits for sessions to drain

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use ariwire_core::error::Result;
use ariwire_gateway::control::spawn_control_session;
use ariwire_gateway::dispatch::{Dispatcher, LoggingObserver};
use ariwire_gateway::transport::client;
use ariwire_gateway::{config, Gateway};

const CONFIG_ENV: &str = "ARIWIRE_CONFIG";
const DEFAULT_CONFIG: &str = "ariwire.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "ariwire-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = config::load_from_file(&path)?;
    tracing::info!(config = %path, "ariwire-gateway starting");

    let observer = Arc::new(LoggingObserver::new(&cfg.control.quiet_events));
    let dispatcher = Arc::new(Dispatcher::new(observer));
    let gateway = Gateway::start(&cfg, Arc::clone(&dispatcher)).await?;

    let outbound = match &cfg.client {
        Some(client_cfg) => {
            let conn = client::connect_control(client_cfg).await?;
            let tag = client_cfg.tag.as_deref().unwrap_or(&client_cfg.app);
            Some(spawn_control_session(
                conn,
                dispatcher,
                tag.into(),
                gateway.state().shutdown().clone(),
            ))
        }
        None => None,
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed; stopping");
    }
    tracing::info!("shutdown requested");

    gateway.stop().await?;
    if let Some(handle) = outbound {
        handle.join().await?;
    }
    Ok(())
}
