//! API interaction module
//!
//! This module provides the collaborators the resolution and purge engine
//! talk to: listing every entity of a kind, and deleting one resource.
//!
//! # Module Structure
//!
//! - [`auth`] - Token or username/password credentials
//! - [`client`] - Main API client, implements [`ResourceApi`]
//! - [`dispatch`] - Per-kind delete calls
//! - [`http`] - HTTP utilities and [`ApiError`]
//!
//! # Example
//!
//! ```ignore
//! use upsweep::api::{ApiClient, Credentials, ResourceApi};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ApiClient::new(DEFAULT_API_URL, Credentials::Token(token))?;
//!     let networks = client.list(ResourceKind::Network).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod dispatch;
pub mod http;

pub use auth::Credentials;
pub use client::{ApiClient, DEFAULT_API_URL, DEFAULT_CLIENT_TIMEOUT};
pub use http::{format_api_error, ApiError};

use crate::resource::{Entity, Resource, ResourceKind};
use async_trait::async_trait;

/// Listing and deletion collaborator for every resource kind
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Return the complete live set of entities of one kind
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Entity>, ApiError>;

    /// Delete one resource
    async fn delete(&self, resource: &Resource) -> Result<(), ApiError>;
}
