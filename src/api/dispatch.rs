//! Delete Dispatch
//!
//! Maps each resource kind to the REST calls that delete it. Most kinds are
//! a single DELETE; a few need preparation first (stopping a server,
//! disabling a peering, emptying an object storage) and managed services are
//! polled until they are really gone.

use super::client::ApiClient;
use super::http::ApiError;
use crate::resource::{get_kind_def, Resource, ResourceKind};
use serde_json::{json, Value};
use std::future::Future;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Delete one resource
///
/// A 404 means an earlier attempt already went through, so it counts as deleted.
pub async fn delete_resource(client: &ApiClient, resource: &Resource) -> Result<(), ApiError> {
    let def = get_kind_def(resource.kind)
        .ok_or_else(|| ApiError::UnknownKind(resource.kind.to_string()))?;
    let id = resource.key();
    let path = def.delete_path_for(id);

    let prepared = match resource.kind {
        ResourceKind::NetworkPeering => disable_network_peering(client, id).await,
        ResourceKind::ObjectStorage => empty_object_storage(client, id).await,
        ResourceKind::Database => disable_termination_protection(client, id).await,
        ResourceKind::Server => stop_server(client, id).await,
        ResourceKind::KubernetesCluster
        | ResourceKind::LoadBalancer
        | ResourceKind::CertificateBundle
        | ResourceKind::Network
        | ResourceKind::Router
        | ResourceKind::ServerGroup
        | ResourceKind::Storage
        | ResourceKind::Tag => Ok(()),
    };

    match prepared {
        Err(e) if e.is_not_found() => return already_gone(resource),
        Err(e) => return Err(e),
        Ok(()) => {}
    }

    match client.delete_at(&path).await {
        Err(e) if e.is_not_found() => return already_gone(resource),
        Err(e) => return Err(e),
        Ok(()) => {}
    }

    // Managed services are torn down asynchronously after the DELETE is accepted
    match resource.kind {
        ResourceKind::KubernetesCluster | ResourceKind::Database | ResourceKind::ObjectStorage => {
            tracing::debug!("Waiting for {} {} to be deleted", resource.kind, id);
            wait_until_gone(client, &path).await
        }
        ResourceKind::LoadBalancer
        | ResourceKind::CertificateBundle
        | ResourceKind::Network
        | ResourceKind::NetworkPeering
        | ResourceKind::Router
        | ResourceKind::Server
        | ResourceKind::ServerGroup
        | ResourceKind::Storage
        | ResourceKind::Tag => Ok(()),
    }
}

fn already_gone(resource: &Resource) -> Result<(), ApiError> {
    tracing::warn!("{} {} was already gone", resource.kind, resource.key());
    Ok(())
}

/// Run `check` once per poll interval until it reports done
///
/// The first check happens one interval after the call. Fails with
/// `WaitTimeout` once the client's wait timeout elapses.
async fn poll_until<F, Fut>(client: &ApiClient, what: String, mut check: F) -> Result<(), ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ApiError>>,
{
    let period = client.poll_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let polling = async {
        loop {
            ticker.tick().await;
            if check().await? {
                return Ok(());
            }
        }
    };

    match tokio::time::timeout(client.wait_timeout(), polling).await {
        Ok(done) => done,
        Err(_) => Err(ApiError::WaitTimeout(what)),
    }
}

/// Poll a resource path until it answers 404
async fn wait_until_gone(client: &ApiClient, path: &str) -> Result<(), ApiError> {
    poll_until(client, format!("{} to be deleted", path), move || async move {
        match client.get(path).await {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        }
    })
    .await
}

/// A conflict here means the peering is already disabled or changing state,
/// the DELETE that follows decides whether the attempt succeeds
async fn disable_network_peering(client: &ApiClient, uuid: &str) -> Result<(), ApiError> {
    let path = format!("/network-peering/{}", uuid);
    let body = json!({ "network_peering": { "configured_status": "disabled" } });
    match client.patch(&path, &body).await {
        Err(e) if e.status() == Some(409) => {}
        Err(e) => return Err(e),
        Ok(()) => {}
    }

    let path = path.as_str();
    let waited = poll_until(client, format!("{} to be disabled", path), move || async move {
        let peering = client.get(path).await?;
        Ok(peering.pointer("/network_peering/state").and_then(|v| v.as_str()) == Some("disabled"))
    })
    .await;

    match waited {
        Err(ApiError::WaitTimeout(what)) => {
            tracing::warn!("Timed out waiting for {}, deleting anyway", what);
            Ok(())
        }
        other => other,
    }
}

async fn disable_termination_protection(client: &ApiClient, uuid: &str) -> Result<(), ApiError> {
    let body = json!({ "termination_protection": false });
    client.patch(&format!("/database/{}", uuid), &body).await
}

/// Hard stop a server that is still running; deleting a started server is refused
async fn stop_server(client: &ApiClient, uuid: &str) -> Result<(), ApiError> {
    let response = client.get(&format!("/server/{}", uuid)).await?;
    let state = response
        .pointer("/server/state")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if state != "started" {
        return Ok(());
    }

    tracing::info!("Stopping server {} before deletion", uuid);
    let body = json!({ "stop_server": { "stop_type": "hard", "timeout": "60" } });
    client.post(&format!("/server/{}/stop", uuid), &body).await
}

/// Remove users, custom policies and buckets so the service itself can be deleted
async fn empty_object_storage(client: &ApiClient, uuid: &str) -> Result<(), ApiError> {
    let service = format!("/object-storage-2/{}", uuid);

    let users = client.get(&format!("{}/users", service)).await?;
    for username in names(&users, "username") {
        client
            .delete_at(&format!("{}/users/{}", service, urlencoding::encode(&username)))
            .await?;
    }

    let policies = client.get(&format!("{}/policies", service)).await?;
    for name in custom_policy_names(&policies) {
        client
            .delete_at(&format!("{}/policies/{}", service, urlencoding::encode(&name)))
            .await?;
    }

    let buckets_path = format!("{}/buckets", service);
    let buckets = names(&client.get(&buckets_path).await?, "name");
    if buckets.is_empty() {
        return Ok(());
    }
    for name in buckets {
        client
            .delete_at(&format!("{}/{}", buckets_path, urlencoding::encode(&name)))
            .await?;
    }

    // Bucket deletion is asynchronous and the service refuses deletion until it is empty
    let buckets_path = buckets_path.as_str();
    poll_until(client, format!("{} to be empty", buckets_path), move || async move {
        let buckets = client.get(buckets_path).await?;
        Ok(names(&buckets, "name").is_empty())
    })
    .await
}

fn names(list: &Value, field: &str) -> Vec<String> {
    list.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.get(field).and_then(|v| v.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Policy names, without the system policies every service carries
fn custom_policy_names(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|arr| {
            arr.iter()
                .filter(|item| !item.get("system").and_then(|v| v.as_bool()).unwrap_or(false))
                .filter_map(|item| item.get("name").and_then(|v| v.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
