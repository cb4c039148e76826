use std::sync::Arc;

use game_pool::{prelude::*, server::run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env();
    game_pool::init_logger(&config)?;
    info!(?config, "starting game server");

    let pool = Arc::new(GamePool::new(config.clone()));
    run_server(pool, &config).await
}
