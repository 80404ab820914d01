//! Kind Registry - Load listing metadata from JSON
//!
//! Every resource kind is described by an entry in one of the embedded JSON
//! files: where to list it, where the items live in the response, which
//! fields hold the identifier and display name, and where to delete it.

use super::kind::ResourceKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded kind JSON files (compiled into the binary)
const KIND_FILES: &[&str] = &[
    include_str!("../resources/network.json"),
    include_str!("../resources/compute.json"),
    include_str!("../resources/managed.json"),
];

/// Kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub display_name: String,
    /// Listing endpoint, relative to the API base URL
    pub list_path: String,
    /// Dot separated path to the item array; empty when the body is the array
    pub response_path: String,
    pub id_field: String,
    pub name_field: String,
    /// Sub-type used by the fixed inclusion rules (router type, storage access)
    #[serde(default)]
    pub variant_field: Option<String>,
    #[serde(default)]
    pub state_field: Option<String>,
    /// Delete endpoint template, `{id}` is replaced with the identifier
    pub delete_path: String,
    /// When set, the listing is fetched with `limit`/`offset` paging
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl KindDef {
    /// Delete endpoint for one identifier
    pub fn delete_path_for(&self, id: &str) -> String {
        self.delete_path
            .replace("{id}", &urlencoding::encode(id))
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    #[serde(default)]
    pub kinds: HashMap<String, KindDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<KindConfig> = OnceLock::new();

/// Get the kind registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static KindConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = KindConfig {
            kinds: HashMap::new(),
        };

        for content in KIND_FILES {
            let partial: KindConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded kind JSON: {}", e));
            final_config.kinds.extend(partial.kinds);
        }

        final_config
    })
}

/// Get the definition of a kind
pub fn get_kind_def(kind: ResourceKind) -> Option<&'static KindDef> {
    get_registry().kinds.get(kind.as_str())
}
