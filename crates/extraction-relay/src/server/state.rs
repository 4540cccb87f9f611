//! Application state for the relay server

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::store::{self, JobStore};
use crate::upstream::{HttpUpstreamClient, UpstreamJobClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RelayConfig,
    /// Poll-time reconciliation over the store and the upstream client
    reconciler: Reconciler,
}

impl AppState {
    /// Create new application state from configuration
    pub fn new(config: RelayConfig) -> Result<Self> {
        tracing::info!(
            "Initializing relay state (store: {:?}, upstream: {})",
            config.store.backend,
            config.upstream.base_url
        );

        let store = store::open_store(&config.store)?;
        let client: Arc<dyn UpstreamJobClient> = Arc::new(HttpUpstreamClient::new(&config.upstream)?);

        Ok(Self::from_parts(config, client, store))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: RelayConfig,
        client: Arc<dyn UpstreamJobClient>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let reconciler = Reconciler::new(client, store, config.polling.fetch_timeout());
        Self {
            inner: Arc::new(AppStateInner { config, reconciler }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.inner.reconciler.store()
    }
}
