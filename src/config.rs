//! Configuration for the provenance search client.
//! Covers the query service endpoint and the polling behavior.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Main configuration structure for the search client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query service endpoint configuration
    pub api: ApiConfig,
    /// Query submission and polling settings
    pub query: QueryConfig,
}

/// Query service endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the query service API
    pub base_url: Url,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Query submission and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum number of events a single query may return
    pub max_results: u32,
    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8080/dataflow-api").unwrap(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: 1000,
            poll_interval_ms: 2000,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("PROVENANCE_API_URL") {
            config.api.base_url = Url::parse(&url).context("Invalid PROVENANCE_API_URL")?;
        }

        if let Ok(timeout) = std::env::var("PROVENANCE_REQUEST_TIMEOUT_SECS") {
            config.api.request_timeout_secs = timeout
                .parse()
                .context("Invalid PROVENANCE_REQUEST_TIMEOUT_SECS")?;
        }

        if let Ok(max_results) = std::env::var("PROVENANCE_MAX_RESULTS") {
            config.query.max_results = max_results
                .parse()
                .context("Invalid PROVENANCE_MAX_RESULTS")?;
        }

        if let Ok(interval) = std::env::var("PROVENANCE_POLL_INTERVAL_MS") {
            config.query.poll_interval_ms = interval
                .parse()
                .context("Invalid PROVENANCE_POLL_INTERVAL_MS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.api.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow::anyhow!(
                    "Query service URL must be http or https, got {}",
                    other
                ))
            }
        }

        if self.api.base_url.cannot_be_a_base() {
            return Err(anyhow::anyhow!("Query service URL cannot be a base URL"));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout cannot be 0"));
        }

        if self.query.max_results == 0 {
            return Err(anyhow::anyhow!("Max results cannot be 0"));
        }

        if self.query.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Poll interval cannot be 0"));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }

    /// Get the delay between status polls as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.query.poll_interval_ms)
    }
}
