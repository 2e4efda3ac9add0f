//! omx-vision - artwork training webhook service
//!
//! Receives CMS webhook deliveries for artwork records and drives the
//! remote image-classification training project through its lifecycle.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use omx_vision::{build_router, AppState, TrainerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting omx-vision (artwork training hook) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = TrainerConfig::load(config_path.as_deref())?;
    info!(
        endpoint = %config.endpoint,
        project_id = %config.project_id,
        publish_name = %config.publish_name,
        "Configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
