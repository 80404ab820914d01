//! Resource abstraction layer
//!
//! This module turns raw API listings into the generic [`Resource`] records
//! the purge engine works with.
//!
//! # Architecture
//!
//! - [`kind`] - The closed set of resource kinds and their fixed inclusion rules
//! - [`registry`] - Loads per-kind listing metadata from embedded JSON
//! - [`fetcher`] - Fetches and projects listings, with paging support
//! - [`lister`] - Resolves include/exclude patterns across every kind
//!
//! # Example
//!
//! ```ignore
//! use upsweep::resource::ResourceLister;
//!
//! async fn doomed(api: Arc<dyn ResourceApi>) -> anyhow::Result<Vec<Resource>> {
//!     let lister = ResourceLister::new(api);
//!     Ok(lister.list_resources(&["*tf-acc-test*".into()], &["*persistent*".into()]).await?)
//! }
//! ```

pub mod fetcher;
pub mod kind;
pub mod lister;
pub mod registry;

pub use kind::ResourceKind;
pub use lister::{ListError, ResourceLister};
pub use registry::{get_kind_def, KindDef};

use serde::Serialize;

/// One listed API object, projected to the fields resolution needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// UUID, or the name for kinds without one
    pub id: String,
    pub name: String,
    pub variant: Option<String>,
    pub state: Option<String>,
}

/// A resource selected for listing or deletion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub uuid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Resource {
    pub fn from_entity(kind: ResourceKind, entity: Entity) -> Self {
        let uuid = if kind.has_uuid() {
            entity.id
        } else {
            String::new()
        };

        Self {
            kind,
            uuid,
            name: entity.name,
            state: entity.state,
        }
    }

    /// Progress key: the UUID, or the name when the kind has no UUID
    pub fn key(&self) -> &str {
        if self.uuid.is_empty() {
            &self.name
        } else {
            &self.uuid
        }
    }
}
