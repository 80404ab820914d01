//! Configuration Management
//!
//! Handles persistent configuration for upsweep. Values come from the JSON
//! config file, then environment variables override them; command-line flags
//! are applied on top by the binary.

use crate::api::{DEFAULT_API_URL, DEFAULT_CLIENT_TIMEOUT};
use crate::purge::{PurgeOptions, DEFAULT_CONCURRENCY, DEFAULT_RETRY_DELAY};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_USERNAME: &str = "UPCLOUD_USERNAME";
pub const ENV_PASSWORD: &str = "UPCLOUD_PASSWORD";
pub const ENV_TOKEN: &str = "UPCLOUD_TOKEN";
pub const ENV_API_URL: &str = "UPCLOUD_API_URL";

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

fn default_client_timeout_secs() -> u64 {
    DEFAULT_CLIENT_TIMEOUT.as_secs()
}

/// User configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// API token, preferred over username and password
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Upper bound for a single API request
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    /// Maximum number of deletions in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Unset means retry until deleted
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            token: None,
            api_url: None,
            client_timeout_secs: default_client_timeout_secs(),
            concurrency: default_concurrency(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: None,
        }
    }
}

/// Directory holding the config file and the log
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("upsweep"))
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from the default location and the environment
    pub fn load() -> Self {
        let config = match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Load configuration from a file; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Could not read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Override values with environment variables found through `lookup`
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(username) = get(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(api_url) = get(ENV_API_URL) {
            self.api_url = Some(api_url);
        }
        self
    }

    /// Effective API base URL, validated
    pub fn api_url(&self) -> Result<String> {
        let raw = self.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let url = url::Url::parse(raw).with_context(|| format!("Invalid API URL: {}", raw))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API URL must use http or https: {}", raw);
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Per-request timeout, which has to be positive
    pub fn client_timeout(&self) -> Result<Duration> {
        if self.client_timeout_secs == 0 {
            anyhow::bail!("Client timeout must be at least one second");
        }
        Ok(Duration::from_secs(self.client_timeout_secs))
    }

    pub fn purge_options(&self) -> PurgeOptions {
        PurgeOptions {
            concurrency: self.concurrency,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            max_attempts: self.max_attempts,
        }
    }
}
