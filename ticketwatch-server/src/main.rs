use std::sync::Arc;
use tracing::info;

use ticketwatch_server::{Catalog, Config, build_router, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded {} events from {}", config.events.len(), config_path);

    let catalog = Arc::new(Catalog::new(config.events.clone()));
    let app = build_router(catalog, config.enable_cors);

    // Bind to address
    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Availability API listening on http://{}/api/v1", address);

    serve(listener, app).await?;

    Ok(())
}
