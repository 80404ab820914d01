//! Entity cache
//!
//! Holds the entities fetched by a single listing call, keyed by identifier.
//! Filled once before any concurrent work starts and only read afterwards.

use super::ResolveError;
use std::collections::HashMap;

/// Keyed storage of previously fetched entities
#[derive(Debug, Clone)]
pub struct Cache<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> Cache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entity stored under `id`
    pub fn add_cached(&mut self, id: impl Into<String>, entity: T) {
        self.entries.insert(id.into(), entity);
    }

    /// Fetch a cached entity, failing with `NotFound(id)` if absent
    pub fn get_cached(&self, id: &str) -> Result<T, ResolveError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
