//! In-memory [`ResourceApi`] used by unit tests

use crate::api::{ApiError, ResourceApi};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::resource::{Entity, Resource, ResourceKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn entity(id: &str, name: &str) -> Entity {
    Entity {
        id: id.to_string(),
        name: name.to_string(),
        variant: None,
        state: None,
    }
}

pub fn entity_variant(id: &str, name: &str, variant: &str) -> Entity {
    Entity {
        variant: Some(variant.to_string()),
        ..entity(id, name)
    }
}

pub fn resource(kind: ResourceKind, id: &str, name: &str) -> Resource {
    Resource::from_entity(kind, entity(id, name))
}

#[derive(Default)]
pub struct FakeApi {
    listings: HashMap<ResourceKind, Vec<Entity>>,
    failing_lists: HashSet<ResourceKind>,
    list_calls: Mutex<HashMap<ResourceKind, usize>>,
    /// Remaining failures per resource key
    delete_failures: Mutex<HashMap<String, u32>>,
    always_failing: HashSet<String>,
    panicking: HashSet<String>,
    delete_latency: Duration,
    attempts: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(mut self, kind: ResourceKind, entities: Vec<Entity>) -> Self {
        self.listings.insert(kind, entities);
        self
    }

    pub fn failing_list(mut self, kind: ResourceKind) -> Self {
        self.failing_lists.insert(kind);
        self
    }

    /// The first `times` deletions of `key` fail
    pub fn failing_delete(self, key: &str, times: u32) -> Self {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
        self
    }

    pub fn always_failing_delete(mut self, key: &str) -> Self {
        self.always_failing.insert(key.to_string());
        self
    }

    /// Deleting `key` panics inside the collaborator
    pub fn panicking_delete(mut self, key: &str) -> Self {
        self.panicking.insert(key.to_string());
        self
    }

    pub fn with_delete_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.list_calls
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn attempts_for(&self, key: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|k| *k == key)
            .count()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn server_error(message: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Entity>, ApiError> {
        *self.list_calls.lock().unwrap().entry(kind).or_insert(0) += 1;

        if self.failing_lists.contains(&kind) {
            return Err(server_error("listing failed"));
        }
        Ok(self.listings.get(&kind).cloned().unwrap_or_default())
    }

    async fn delete(&self, resource: &Resource) -> Result<(), ApiError> {
        let key = resource.key().to_string();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delete_latency.is_zero() {
            tokio::time::sleep(self.delete_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.attempts.lock().unwrap().push(key.clone());

        if self.panicking.contains(&key) {
            panic!("deleting {} blew up", key);
        }

        if self.always_failing.contains(&key) {
            return Err(server_error("resource is busy"));
        }

        {
            let mut failures = self.delete_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&key).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(server_error("resource is busy"));
            }
        }

        self.deleted.lock().unwrap().push(key);
        Ok(())
    }
}

/// Sink that keeps every event for inspection
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn for_key(&self, key: &str) -> Vec<ProgressUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.key == key)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn push_update(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
