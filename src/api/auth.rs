//! API Authentication
//!
//! Handles authentication with either an API token (bearer) or account
//! username and password (HTTP basic).

use crate::config::Config;
use anyhow::Result;
use reqwest::RequestBuilder;
use std::fmt;

/// Credentials attached to every API request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Pick credentials from the effective configuration
    ///
    /// A token wins over username and password when both are configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Self::Token(token.to_string()));
        }

        match (config.username.as_deref(), config.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() => Ok(Self::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(anyhow::anyhow!(
                "No API credentials configured. Set UPCLOUD_TOKEN, or UPCLOUD_USERNAME and UPCLOUD_PASSWORD"
            )),
        }
    }

    /// Attach the credentials to a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Token(token) => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

// Never print secrets, even at trace level
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({}:***)", username),
        }
    }
}
