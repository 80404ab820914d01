//! API Client
//!
//! Main client for the resource API, combining authentication and HTTP
//! functionality. Implements [`ResourceApi`] for every resource kind.

use super::auth::Credentials;
use super::dispatch;
use super::http::{ApiError, HttpClient};
use super::ResourceApi;
use crate::resource::{fetcher, Entity, Resource, ResourceKind};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://api.upcloud.com/1.3";

/// Upper bound for a single request
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Pause between polls while waiting for a deletion to settle
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for one wait-until-deleted or wait-until-empty loop
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Main API client
#[derive(Clone)]
pub struct ApiClient {
    pub http: HttpClient,
    pub credentials: Credentials,
    base_url: String,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, credentials, DEFAULT_CLIENT_TIMEOUT)
    }

    /// Create a new API client whose requests give up after `timeout`
    pub fn with_timeout(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpClient::new(timeout)?,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        })
    }

    /// Set how often and for how long deletions are polled until they settle
    pub fn with_polling(mut self, interval: Duration, wait_timeout: Duration) -> Self {
        // tokio intervals reject a zero period
        self.poll_interval = interval.max(Duration::from_millis(1));
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Build a full URL from an API path such as `/network`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET an API path
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.http.get(&self.url(path), &self.credentials).await
    }

    /// PATCH an API path
    pub async fn patch(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        self.http
            .patch(&self.url(path), &self.credentials, body)
            .await
    }

    /// POST to an API path
    pub async fn post(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        self.http.post(&self.url(path), &self.credentials, body).await
    }

    /// DELETE an API path
    pub async fn delete_at(&self, path: &str) -> Result<(), ApiError> {
        self.http.delete(&self.url(path), &self.credentials).await
    }
}

#[async_trait]
impl ResourceApi for ApiClient {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Entity>, ApiError> {
        fetcher::fetch_entities(self, kind).await
    }

    async fn delete(&self, resource: &Resource) -> Result<(), ApiError> {
        dispatch::delete_resource(self, resource).await
    }
}
