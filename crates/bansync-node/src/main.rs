//! Ban sync node binary
//!
//! Keeps every synced guild enforcing the global ban list.

use bansync_node::{BanSyncNode, MemoryClient, NodeConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bansync_node=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ban sync node");

    let config = NodeConfig::from_env()?;

    tracing::warn!(
        "Running against the in-memory client with {} simulated guilds",
        config.guilds.len()
    );
    let client = Arc::new(MemoryClient::with_guilds(config.guilds.clone()));

    let node = BanSyncNode::new(config, client).await?;
    node.run().await?;

    Ok(())
}
