use std::sync::Arc;
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_server::{run_server, ProxyConfig, ProxyState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,relay_server=debug".into());
    let json_logs = std::env::var("RELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::info!("Backup relay v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    tracing::info!("Drive backend: {:?}", config.drive);
    tracing::info!("Listen address: {}", config.listen_addr);

    let state = Arc::new(ProxyState::from_config(config).await?);

    tokio::select! {
        result = run_server(state) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

fn load_config() -> Result<ProxyConfig> {
    let config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => ProxyConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        Err(_) => ProxyConfig::default(),
    };

    // Environment overrides the file
    config.apply_env(|key| std::env::var(key).ok())
}
