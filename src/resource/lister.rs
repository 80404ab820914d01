//! Resource Lister
//!
//! Resolves include and exclude patterns against every resource kind and
//! flattens the survivors into one list, grouped by kind in listing order.

use super::kind::ResourceKind;
use super::Resource;
use crate::api::{ApiError, ResourceApi};
use crate::resolver::{CachingProvider, ResolutionProvider, ResolveError, Resolver};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("Failed to list {kind} resources: {source}")]
    Resolution {
        kind: ResourceKind,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Lists the resources selected by include/exclude patterns
pub struct ResourceLister {
    api: Arc<dyn ResourceApi>,
    kinds: Vec<ResourceKind>,
}

impl ResourceLister {
    pub fn new(api: Arc<dyn ResourceApi>) -> Self {
        Self {
            api,
            kinds: ResourceKind::ALL.to_vec(),
        }
    }

    /// Restrict listing to the given kinds; an empty slice keeps every kind
    pub fn with_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        if !kinds.is_empty() {
            self.kinds = ResourceKind::ALL
                .iter()
                .copied()
                .filter(|k| kinds.contains(k))
                .collect();
        }
        self
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    /// Every live resource matching any include pattern and no exclude pattern
    ///
    /// An empty include list selects everything. One failing listing fails the
    /// whole call.
    pub async fn list_resources(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<Resource>, ListError> {
        let everything = ["*".to_string()];
        let include = if include.is_empty() {
            &everything[..]
        } else {
            include
        };

        let per_kind = try_join_all(
            self.kinds
                .iter()
                .map(|kind| self.list_kind(*kind, include, exclude)),
        )
        .await?;

        let resources: Vec<Resource> = per_kind.into_iter().flatten().collect();
        tracing::info!(
            "Listed {} resources (include: {:?}, exclude: {:?})",
            resources.len(),
            include,
            exclude
        );
        Ok(resources)
    }

    /// The single resource of `kind` that `arg` names
    ///
    /// Fails with `Ambiguous` when several resources match equally well.
    pub async fn resolve_one(&self, kind: ResourceKind, arg: &str) -> Result<Resource, ListError> {
        let mut provider = CachingProvider::new(kind);
        let resolve = provider
            .get(self.api.as_ref())
            .await
            .map_err(|source| ListError::Resolution { kind, source })?;

        let id = resolve(arg).get_only()?;
        let entity = provider.get_cached(&id)?;
        Ok(Resource::from_entity(kind, entity))
    }

    async fn list_kind(
        &self,
        kind: ResourceKind,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<Resource>, ListError> {
        let mut provider = CachingProvider::new(kind);
        let resolve = provider
            .get(self.api.as_ref())
            .await
            .map_err(|source| ListError::Resolution { kind, source })?;

        let excluded: HashSet<String> = matched_ids(&resolve, exclude)?.into_iter().collect();

        let mut resources = Vec::new();
        for id in matched_ids(&resolve, include)? {
            if excluded.contains(&id) {
                continue;
            }
            let entity = provider.get_cached(&id)?;
            if !kind.retains(&entity) {
                tracing::debug!("Skipping {} {} ({:?})", kind, entity.name, entity.variant);
                continue;
            }
            resources.push(Resource::from_entity(kind, entity));
        }

        Ok(resources)
    }
}

/// Union of the identifiers matched by any pattern, in first-seen order
///
/// A pattern matching nothing contributes nothing.
fn matched_ids(resolve: &Resolver, patterns: &[String]) -> Result<Vec<String>, ResolveError> {
    let mut ids: Vec<String> = Vec::new();

    for pattern in patterns {
        match resolve(pattern.as_str()).get_all() {
            Ok(found) => {
                for id in found {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            Err(ResolveError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(ids)
}
