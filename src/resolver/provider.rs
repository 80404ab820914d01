//! Resolution providers
//!
//! A provider lists one resource kind through the API, caches what it got,
//! and hands back a [`Resolver`] that matches arguments against that snapshot.

use super::cache::Cache;
use super::{match_title, match_uuid, Resolved, Resolver};
use crate::api::{ApiError, ResourceApi};
use crate::resource::{Entity, ResourceKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can build a [`Resolver`] for one resource kind
#[async_trait]
pub trait ResolutionProvider: Send {
    async fn get(&mut self, api: &dyn ResourceApi) -> Result<Resolver, ApiError>;
}

/// Provider that lists its kind once per invocation and caches the entities
pub struct CachingProvider {
    kind: ResourceKind,
    cache: Cache<Entity>,
    /// Listing order, kept so matches come back in API order
    listed: Option<Arc<Vec<Entity>>>,
}

impl CachingProvider {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            cache: Cache::new(),
            listed: None,
        }
    }

    pub fn get_cached(&self, id: &str) -> Result<Entity, super::ResolveError> {
        self.cache.get_cached(id)
    }

    async fn fill(&mut self, api: &dyn ResourceApi) -> Result<Arc<Vec<Entity>>, ApiError> {
        if let Some(listed) = &self.listed {
            return Ok(Arc::clone(listed));
        }

        let entities = api.list(self.kind).await?;
        for entity in &entities {
            self.cache.add_cached(entity.id.clone(), entity.clone());
        }
        tracing::debug!("Cached {} {} entities", self.cache.len(), self.kind);

        let listed = Arc::new(entities);
        self.listed = Some(Arc::clone(&listed));
        Ok(listed)
    }
}

#[async_trait]
impl ResolutionProvider for CachingProvider {
    async fn get(&mut self, api: &dyn ResourceApi) -> Result<Resolver, ApiError> {
        let entities = self.fill(api).await?;
        let by_uuid = self.kind.has_uuid();

        Ok(Box::new(move |arg: &str| {
            let mut resolved = Resolved::new(arg);
            for entity in entities.iter() {
                if by_uuid {
                    resolved.add_match(&entity.id, match_uuid(arg, &entity.id));
                }
                resolved.add_match(&entity.id, match_title(arg, &entity.name));
            }
            resolved
        }))
    }
}
