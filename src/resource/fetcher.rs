//! Resource Fetcher
//!
//! Fetches complete listings from the API based on kind definitions and
//! projects each item to an [`Entity`].

use super::kind::ResourceKind;
use super::registry::{get_kind_def, KindDef};
use super::Entity;
use crate::api::{ApiClient, ApiError};
use serde_json::Value;

/// Fetch every entity of a kind (auto-paginate)
pub async fn fetch_entities(client: &ApiClient, kind: ResourceKind) -> Result<Vec<Entity>, ApiError> {
    let Some(def) = get_kind_def(kind) else {
        return Err(ApiError::UnknownKind(kind.to_string()));
    };

    let Some(page_size) = def.page_size else {
        let response = client.get(&def.list_path).await?;
        return Ok(project_items(&response, def));
    };

    let mut all_items = Vec::new();
    let mut offset = 0;

    loop {
        let path = format!("{}?limit={}&offset={}", def.list_path, page_size, offset);
        let response = client.get(&path).await?;
        let items = extract_items(&response, &def.response_path);
        all_items.extend(items.iter().filter_map(|item| entity_from_value(item, def)));

        // A short page ends the listing, counted before skipping items without an id
        if items.len() < page_size {
            break;
        }
        offset += page_size;
    }

    tracing::debug!("Fetched {} {}", all_items.len(), def.display_name);
    Ok(all_items)
}

/// Extract the items of one response and project them
pub fn project_items(response: &Value, def: &KindDef) -> Vec<Entity> {
    extract_items(response, &def.response_path)
        .iter()
        .filter_map(|item| entity_from_value(item, def))
        .collect()
}

/// Extract items from response using the response_path
fn extract_items<'a>(response: &'a Value, path: &str) -> &'a [Value] {
    let mut current = response;

    if !path.is_empty() {
        for part in path.split('.') {
            current = match current.get(part) {
                Some(v) => v,
                None => return &[],
            };
        }
    }

    current.as_array().map(|arr| arr.as_slice()).unwrap_or_default()
}

/// Project one item; items without an identifier are skipped
fn entity_from_value(item: &Value, def: &KindDef) -> Option<Entity> {
    let id = extract_string(item, &def.id_field).filter(|id| !id.is_empty())?;
    let name = extract_string(item, &def.name_field).unwrap_or_default();

    Some(Entity {
        id,
        name,
        variant: def
            .variant_field
            .as_deref()
            .and_then(|f| extract_string(item, f)),
        state: def
            .state_field
            .as_deref()
            .and_then(|f| extract_string(item, f)),
    })
}

/// Extract a scalar from JSON using a dot-notation path
pub fn extract_string(item: &Value, path: &str) -> Option<String> {
    let mut current = item;

    for part in path.split('.') {
        current = current.get(part)?;
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
