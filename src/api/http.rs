//! HTTP utilities for REST API calls

use super::auth::Credentials;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Errors from a single API call
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API request failed: {status} {message}")]
    Status { status: u16, message: String },

    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No API definition for resource type: {0}")]
    UnknownKind(String),

    #[error("Timed out waiting for {0}")]
    WaitTimeout(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::WaitTimeout(_) => true,
            _ => false,
        }
    }
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_LOG_BODY_LENGTH)
            .last()
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull the human readable message out of an API error body
///
/// Handles both `{"error": {"error_message": ..}}` and problem+json `{"title": ..}` shapes.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };

    value
        .pointer("/error/error_message")
        .or_else(|| value.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// HTTP client wrapper for API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client; `timeout` bounds every request end to end
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("upsweep/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request and parse the JSON body
    pub async fn get(&self, url: &str, credentials: &Credentials) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);
        let request = credentials.apply(self.client.get(url));
        let body = Self::send(request).await?;

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch(
        &self,
        url: &str,
        credentials: &Credentials,
        body: &Value,
    ) -> Result<(), ApiError> {
        tracing::debug!("PATCH {}", url);
        let request = credentials.apply(self.client.patch(url)).json(body);
        Self::send(request).await.map(|_| ())
    }

    /// Make a POST request with a JSON body
    pub async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: &Value,
    ) -> Result<(), ApiError> {
        tracing::debug!("POST {}", url);
        let request = credentials.apply(self.client.post(url)).json(body);
        Self::send(request).await.map(|_| ())
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, credentials: &Credentials) -> Result<(), ApiError> {
        tracing::debug!("DELETE {}", url);
        let request = credentials.apply(self.client.delete(url));
        Self::send(request).await.map(|_| ())
    }

    async fn send(request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }
}

/// Format an API error for display
pub fn format_api_error(error: &ApiError) -> String {
    if let ApiError::Transport(e) = error {
        if e.is_timeout() {
            return "Request timed out. The API may be slow to respond.".to_string();
        }
    }

    match error.status() {
        Some(401) => "Authentication failed. Check UPCLOUD_USERNAME/UPCLOUD_PASSWORD or UPCLOUD_TOKEN.".to_string(),
        Some(403) => "Permission denied. Check the API permissions of your account.".to_string(),
        Some(404) => "Resource not found.".to_string(),
        Some(409) => "Resource conflict. The resource may be in use or in a transitional state.".to_string(),
        Some(429) => "Rate limit exceeded. Please try again later.".to_string(),
        Some(status) if status >= 500 => {
            "API service temporarily unavailable. Please try again.".to_string()
        }
        _ => {
            let error_str = error.to_string();
            let sanitized: String = error_str
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect();

            if sanitized.len() < error_str.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}
