//! Gurbani Rust API Client
//!
//! # Creating new api client
//!
//! - [new](GurbaniClient::new) - create new client
//! - [with_config](GurbaniClient::with_config) - create client with custom configuration
//! - [with_client](GurbaniClient::with_client) - create client with configuration and a
//!   custom reqwest client
//!
//! # Configuration
//!
//! - [get_config](GurbaniClient::get_config) - returns configuration
//! - [http_metrics](GurbaniClient::http_metrics) - returns request counters
//!

use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    GURBANI_API_URL, GURBANI_URL_ENV, Result,
    config::DEFAULT_TIMEOUT_SECS,
    http_client::{HttpClient, HttpMetricsSnapshot},
};

/// Configuration for the Gurbani client.
///
/// ```rust,no_run
/// use gurbani::prelude::*;
/// # fn create_client() -> Result<GurbaniClient, GurbaniError> {
/// let config = ClientConfig::default()
///     .base_url("http://127.0.0.1:8080/v2")
///     .timeout(std::time::Duration::from_secs(10));
/// let client = GurbaniClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for all api requests.
    /// If not provided in config, url is determined by:
    /// * The environment variable GURBANI_URL, if defined, or
    /// * `gurbani::GURBANI_API_URL`
    pub base_url: String,

    /// Per-request timeout. Applies to the whole request, including reading the body.
    pub timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var(GURBANI_URL_ENV).unwrap_or(GURBANI_API_URL.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("gurbani-rust/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Sets the base url.
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Sets the request timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        ClientConfig { timeout, ..self }
    }

    /// Sets the User-Agent header.
    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        ClientConfig {
            user_agent: user_agent.into(),
            ..self
        }
    }
}

/// Client for the Gurbani content api.
///
/// Cloning is cheap; clones share the connection pool and metrics.
#[derive(Clone)]
pub struct GurbaniClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
}

impl std::fmt::Debug for GurbaniClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GurbaniClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GurbaniClient {
    /// Creates a new client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with the provided configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());
        Self::with_client(builder, config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with proxies, dns servers, etc.
    /// The builder is used as-is: `config.timeout` and `config.user_agent` are
    /// only applied by [`with_config`](Self::with_config).
    pub fn with_client(builder: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        debug!(url=?config.base_url, "new client");
        let client = HttpClient::new(builder, &config.base_url)?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of current HTTP metrics.
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.client
    }
}
