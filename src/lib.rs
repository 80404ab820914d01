//! Resolve and bulk-delete cloud resources
//!
//! Arguments (names, UUIDs, globs) are resolved against live API listings,
//! and the selected resources are deleted concurrently with automatic retry.

pub mod api;
pub mod config;
pub mod output;
pub mod progress;
pub mod purge;
pub mod resolver;
pub mod resource;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, Credentials, ResourceApi};
pub use config::Config;
pub use purge::{BulkDeleter, DeleteSummary, PurgeError, PurgeOptions};
pub use resource::{Resource, ResourceKind, ResourceLister};
