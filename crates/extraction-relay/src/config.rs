//! Configuration for the extraction relay
//!
//! Loaded from an optional TOML file named by `RELAY_CONFIG`, then overridden
//! by environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

/// Main relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream extraction service
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Poll-time behaviour
    #[serde(default)]
    pub polling: PollingConfig,
    /// Job store
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Upstream extraction service configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the hosted API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token
    #[serde(default)]
    pub api_key: String,
    /// Extraction agent used when starting structured extraction
    #[serde(default)]
    pub extraction_agent_id: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.cloud.llamaindex.ai".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            extraction_agent_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Keeps the API key out of logs
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("extraction_agent_id", &self.extraction_agent_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Poll-time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Timeout for one sub-job fetch in seconds (default: 30)
    pub fetch_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
        }
    }
}

impl PollingConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Job store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file (default)
    #[default]
    Sqlite,
    /// Process memory, lost on restart
    Memory,
}

/// Job store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let sqlite_path = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")))
            .join("extraction-relay")
            .join("jobs.db");

        Self {
            backend: StoreBackend::default(),
            sqlite_path,
        }
    }
}

impl RelayConfig {
    /// Load from `RELAY_CONFIG` (if set) and the process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path, e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("LLAMA_CLOUD_API_KEY") {
            self.upstream.api_key = key;
        }
        if let Some(agent) = var("EXTRACTION_AGENT_ID") {
            self.upstream.extraction_agent_id = Some(agent);
        }
        if let Some(url) = var("UPSTREAM_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(host) = var("RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("RELAY_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("RELAY_PORT is not a port: {}", port)))?;
        }
        if let Some(path) = var("RELAY_DB_PATH") {
            self.store.sqlite_path = PathBuf::from(path);
        }
        if let Some(secs) = var("RELAY_FETCH_TIMEOUT_SECS") {
            self.polling.fetch_timeout_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("RELAY_FETCH_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }

        Ok(())
    }

    /// Check the settings needed at startup
    pub fn validate(&self) -> Result<()> {
        if self.upstream.api_key.trim().is_empty() {
            return Err(Error::Config(
                "upstream API key is missing (set LLAMA_CLOUD_API_KEY)".to_string(),
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(Error::Config("upstream base URL is empty".to_string()));
        }
        if self.polling.fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream.base_url, "https://api.cloud.llamaindex.ai");
        assert_eq!(config.upstream.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.polling.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.store.sqlite_path.ends_with("extraction-relay/jobs.db"));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let err = RelayConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config
            .apply_env(env(&[
                ("LLAMA_CLOUD_API_KEY", "llx-test"),
                ("EXTRACTION_AGENT_ID", "agent-7"),
                ("RELAY_PORT", "9090"),
                ("RELAY_FETCH_TIMEOUT_SECS", "5"),
                ("RELAY_HOST", "  "),
            ]))
            .unwrap();

        assert_eq!(config.upstream.api_key, "llx-test");
        assert_eq!(config.upstream.extraction_agent_id.as_deref(), Some("agent-7"));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.polling.fetch_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let mut config = RelayConfig::default();
        let err = config.apply_env(env(&[("RELAY_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partial_toml() {
        let config = RelayConfig::from_toml(
            r#"
            [upstream]
            api_key = "llx-file"

            [store]
            backend = "memory"
            sqlite_path = "/tmp/unused.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.api_key, "llx-file");
        assert_eq!(config.upstream.request_timeout_secs, 15);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let upstream = UpstreamConfig {
            api_key: "llx-secret".to_string(),
            ..Default::default()
        };
        assert!(!format!("{:?}", upstream).contains("llx-secret"));
    }
}
