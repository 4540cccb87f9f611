//! Extraction relay server binary
//!
//! Run with: cargo run -p extraction-relay --bin extraction-relay-server

use extraction_relay::{config::RelayConfig, server::RelayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "extraction_relay=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Upstream: {}", config.upstream.base_url);
    tracing::info!("  - Request timeout: {}s", config.upstream.request_timeout_secs);
    tracing::info!("  - Fetch timeout: {}s", config.polling.fetch_timeout_secs);
    tracing::info!("  - Store: {:?}", config.store.backend);
    if config.upstream.extraction_agent_id.is_none() {
        tracing::warn!("EXTRACTION_AGENT_ID is not set; structured extraction cannot be started");
    }

    let server = RelayServer::new(config)?;

    println!("\nServer starting...");
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  GET /api/extraction/status/:job_id - Poll a job");
    println!("  GET /api/extraction/jobs           - List your jobs");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
