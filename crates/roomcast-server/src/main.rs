//! # roomcast
//!
//! Ephemeral room signaling relay.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! roomcast
//!
//! # Run with a config file
//! ROOMCAST_CONFIG=/path/to/roomcast.toml roomcast
//!
//! # Override single values
//! ROOMCAST_PORT=8080 ROOMCAST_HOST=0.0.0.0 ROOMCAST_LIMITS__MAX_CLIENTS_PER_ROOM=16 roomcast
//! ```

mod config;
mod handlers;
mod metrics;
mod reaper;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting roomcast on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
