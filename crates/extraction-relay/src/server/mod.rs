//! HTTP server for the extraction relay

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Extraction relay HTTP server
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a server with the upstream client and store named by `config`
    pub fn new(config: RelayConfig) -> Result<Self> {
        Ok(Self::with_state(AppState::new(config)?))
    }

    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting extraction relay on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        let server = &self.state.config().server;
        format!("{}:{}", server.host, server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
