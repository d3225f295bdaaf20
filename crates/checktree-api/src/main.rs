use anyhow::Context;
use checktree_api::{init_tracing, Server};
use checktree_core::ConfigManager;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(ConfigManager::new().context("loading configuration")?);
    init_tracing(&config.settings().logging);

    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}
