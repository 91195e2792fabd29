//! Gateway shard entry point
//!
//! Run with:
//! ```bash
//! DISCORD_TOKEN=... cargo run -p cord-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use cord_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use cord_gateway::{GatewayEvent, Shard, ShardConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load configuration first so tracing can follow APP_ENV
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway shard failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        env = ?config.app.env,
        shard_index = config.gateway.shard_index,
        shard_count = config.gateway.shard_count,
        "Starting gateway shard"
    );

    let shard = Shard::new(ShardConfig::try_from(&config)?);
    let mut events = shard.subscribe();
    shard.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(GatewayEvent::StateChange(change)) => info!(event = %change, "State change"),
                Ok(GatewayEvent::Dispatch(dispatch)) => {
                    info!(event = %dispatch.name, seq = ?dispatch.sequence, "Dispatch received");
                }
                Ok(GatewayEvent::Terminated(Some(err))) => {
                    return Err(anyhow::anyhow!("shard terminated: {err}"));
                }
                Ok(GatewayEvent::Terminated(None)) => return Ok(()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event consumer lagging"),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                shard.shutdown(true).await?;
                info!(
                    session_id = ?shard.session_id(),
                    sequence = ?shard.sequence(),
                    "Shard stopped, session kept for resume"
                );
                return Ok(());
            }
        }
    }
}
