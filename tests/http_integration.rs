//! Integration tests for the API client using wiremock
//!
//! These tests verify listing, deletion and the list + purge flow against
//! mocked endpoints, including error responses and retries.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use upsweep::api::{format_api_error, ApiClient, Credentials, ResourceApi};
use upsweep::progress::SilentProgress;
use upsweep::purge::{BulkDeleter, PurgeOptions};
use upsweep::resource::{Resource, ResourceKind, ResourceLister};
use wiremock::matchers::{basic_auth, bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Credentials::Token("test-token".to_string()))
        .expect("client should build")
        .with_polling(Duration::from_millis(10), Duration::from_secs(5))
}

/// Answer 200 for the first `times` GETs of a path, 404 afterwards
async fn mount_gone_after(server: &MockServer, resource_path: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(resource_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(times)
        .expect(times)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(resource_path))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .with_priority(2)
        .mount(server)
        .await;
}

fn resource(kind: ResourceKind, uuid: &str, name: &str) -> Resource {
    Resource {
        kind,
        uuid: uuid.to_string(),
        name: name.to_string(),
        state: None,
    }
}

/// Every listing not mocked explicitly comes back empty
async fn mount_empty_listings(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .with_priority(10)
        .mount(server)
        .await;
}

/// Test module for listing
mod list_tests {
    use super::*;

    /// Wrapped listings are projected with bearer auth
    #[tokio::test]
    async fn test_list_networks_with_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/network"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": {
                    "network": [
                        { "uuid": "uuid-a", "name": "tf-acc-test-network", "type": "private" },
                        { "uuid": "uuid-b", "name": "uks-e2e-test-network", "type": "private" }
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entities = token_client(&server)
            .list(ResourceKind::Network)
            .await
            .expect("listing should succeed");

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].id, "uuid-b");
        assert_eq!(entities[1].name, "uks-e2e-test-network");
    }

    /// Username and password are sent as HTTP basic auth
    #[tokio::test]
    async fn test_list_with_basic_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/database"))
            .and(basic_auth("user", "pass"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "uuid": "db-1", "title": "tf-acc-test-pg", "state": "running" }
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(
            &server.uri(),
            Credentials::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        )
        .unwrap();

        let entities = client.list(ResourceKind::Database).await.unwrap();
        assert_eq!(entities[0].name, "tf-acc-test-pg");
        assert_eq!(entities[0].state.as_deref(), Some("running"));
    }

    /// Paged kinds keep fetching until a short page
    #[tokio::test]
    async fn test_certificate_bundles_are_paged() {
        let server = MockServer::start().await;

        let full_page: Vec<_> = (0..100)
            .map(|i| json!({ "uuid": format!("cb-{}", i), "name": format!("bundle-{}", i) }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/load-balancer/certificate-bundles"))
            .and(query_param("limit", "100"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/load-balancer/certificate-bundles"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "uuid": "cb-last", "name": "last" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let entities = token_client(&server)
            .list(ResourceKind::CertificateBundle)
            .await
            .unwrap();

        assert_eq!(entities.len(), 101);
        assert_eq!(entities[100].id, "cb-last");
    }

    /// A full page keeps paging even when some of its items lack an id
    #[tokio::test]
    async fn test_paging_counts_items_without_id() {
        let server = MockServer::start().await;

        let mut full_page: Vec<_> = (0..99)
            .map(|i| json!({ "uuid": format!("cb-{}", i), "name": format!("bundle-{}", i) }))
            .collect();
        full_page.push(json!({ "name": "no-uuid" }));

        Mock::given(method("GET"))
            .and(path("/load-balancer/certificate-bundles"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/load-balancer/certificate-bundles"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "uuid": "cb-last", "name": "last" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let entities = token_client(&server)
            .list(ResourceKind::CertificateBundle)
            .await
            .unwrap();

        assert_eq!(entities.len(), 100);
        assert_eq!(entities[99].id, "cb-last");
    }

    /// 401 surfaces as a status error with a friendly message
    #[tokio::test]
    async fn test_401_on_list() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/server"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "error_code": "AUTHENTICATION_FAILED",
                    "error_message": "Authentication failed using the given username and password."
                }
            })))
            .mount(&server)
            .await;

        let err = token_client(&server)
            .list(ResourceKind::Server)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Authentication failed"));
        assert!(format_api_error(&err).starts_with("Authentication failed."));
    }

    /// A failing kind fails the whole listing
    #[tokio::test]
    async fn test_lister_fails_fast_on_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/router"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_empty_listings(&server).await;

        let lister = ResourceLister::new(Arc::new(token_client(&server)));
        assert!(lister.list_resources(&[], &[]).await.is_err());
    }
}

/// Test module for deletion
mod delete_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_network() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-a"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::Network, "uuid-a", "net"))
            .await
            .expect("delete should succeed");
    }

    /// A resource that is already gone counts as deleted
    #[tokio::test]
    async fn test_delete_404_is_success() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/router/uuid-r"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "error_code": "ROUTER_NOT_FOUND", "error_message": "The router does not exist." }
            })))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::Router, "uuid-r", "gw"))
            .await
            .expect("404 should count as deleted");
    }

    #[tokio::test]
    async fn test_delete_conflict_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-a"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": { "error_code": "NETWORK_IN_USE", "error_message": "The network is in use." }
            })))
            .mount(&server)
            .await;

        let err = token_client(&server)
            .delete(&resource(ResourceKind::Network, "uuid-a", "net"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    /// Tags are deleted by name
    #[tokio::test]
    async fn test_delete_tag_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/tag/DEV"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::Tag, "", "DEV"))
            .await
            .unwrap();
    }

    /// A started server is stopped before it is deleted
    #[tokio::test]
    async fn test_started_server_is_stopped_first() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/server/uuid-s"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": { "uuid": "uuid-s", "title": "web", "state": "started" }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/server/uuid-s/stop"))
            .and(body_json(json!({ "stop_server": { "stop_type": "hard", "timeout": "60" } })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/server/uuid-s"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::Server, "uuid-s", "web"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_server_is_deleted_directly() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/server/uuid-s"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": { "uuid": "uuid-s", "state": "stopped" }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/server/uuid-s"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::Server, "uuid-s", "web"))
            .await
            .unwrap();
    }

    /// Database termination protection is lifted before deletion
    #[tokio::test]
    async fn test_database_protection_disabled_first() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/database/db-1"))
            .and(body_json(json!({ "termination_protection": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/database/db-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        mount_gone_after(&server, "/database/db-1", 1).await;

        token_client(&server)
            .delete(&resource(ResourceKind::Database, "db-1", "pg"))
            .await
            .unwrap();
    }

    /// Kubernetes clusters are polled until the API stops returning them
    #[tokio::test]
    async fn test_kubernetes_cluster_waits_until_gone() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/kubernetes/uks-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        mount_gone_after(&server, "/kubernetes/uks-1", 2).await;

        token_client(&server)
            .delete(&resource(ResourceKind::KubernetesCluster, "uks-1", "uks"))
            .await
            .unwrap();
    }

    /// A cluster that never goes away fails the attempt instead of blocking forever
    #[tokio::test]
    async fn test_wait_for_deletion_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/kubernetes/uks-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/kubernetes/uks-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "deleting" })))
            .mount(&server)
            .await;

        let client = token_client(&server)
            .with_polling(Duration::from_millis(10), Duration::from_millis(200));
        let err = client
            .delete(&resource(ResourceKind::KubernetesCluster, "uks-1", "uks"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
    }

    /// A DELETE answered with 404 needs no waiting
    #[tokio::test]
    async fn test_already_deleted_cluster_is_not_polled() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/kubernetes/uks-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::KubernetesCluster, "uks-1", "uks"))
            .await
            .unwrap();
    }

    /// Object storages lose users, custom policies and buckets, then the
    /// service is deleted once no bucket is left and polled until it is gone
    #[tokio::test]
    async fn test_object_storage_is_emptied_first() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/object-storage-2/os-1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "username": "ci" }
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/object-storage-2/os-1/policies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "ECSS3FullAccess", "system": true },
                { "name": "ci-write", "system": false }
            ])))
            .mount(&server)
            .await;

        // Listed once for deletion, still present on the first poll
        Mock::given(method("GET"))
            .and(path("/object-storage-2/os-1/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "bucket-1", "total_objects": 0 }
            ])))
            .up_to_n_times(2)
            .expect(2)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/object-storage-2/os-1/buckets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .with_priority(2)
            .mount(&server)
            .await;

        for delete_path in [
            "/object-storage-2/os-1/users/ci",
            "/object-storage-2/os-1/policies/ci-write",
            "/object-storage-2/os-1/buckets/bucket-1",
            "/object-storage-2/os-1",
        ] {
            Mock::given(method("DELETE"))
                .and(path(delete_path))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;
        }

        Mock::given(method("DELETE"))
            .and(path("/object-storage-2/os-1/policies/ECSS3FullAccess"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        mount_gone_after(&server, "/object-storage-2/os-1", 1).await;

        token_client(&server)
            .delete(&resource(ResourceKind::ObjectStorage, "os-1", "objsto"))
            .await
            .unwrap();
    }

    /// Peerings are disabled first; an already disabled peering is fine
    #[tokio::test]
    async fn test_network_peering_disable_conflict_ignored() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network_peering": { "uuid": "np-1", "state": "disabled" }
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::NetworkPeering, "np-1", "peering"))
            .await
            .unwrap();
    }

    /// The DELETE waits until the peering reports the disabled state
    #[tokio::test]
    async fn test_network_peering_waits_for_disabled_state() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/network-peering/np-1"))
            .and(body_json(json!({ "network_peering": { "configured_status": "disabled" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network_peering": { "uuid": "np-1", "state": "active" }
            })))
            .up_to_n_times(1)
            .expect(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network_peering": { "uuid": "np-1", "state": "disabled" }
            })))
            .expect(1)
            .with_priority(2)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/network-peering/np-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        token_client(&server)
            .delete(&resource(ResourceKind::NetworkPeering, "np-1", "peering"))
            .await
            .unwrap();
    }

    /// A request that outlives the client timeout fails as a timeout
    #[tokio::test]
    async fn test_hung_request_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-a"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = ApiClient::with_timeout(
            &server.uri(),
            Credentials::Token("test-token".to_string()),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client
            .delete(&resource(ResourceKind::Network, "uuid-a", "net"))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(format_api_error(&err).contains("timed out"));
    }
}

/// Test module for the list + purge flow
mod purge_tests {
    use super::*;

    async fn mount_scenario(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/network"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": {
                    "network": [
                        { "uuid": "uuid-A", "name": "tf-acc-test-network" },
                        { "uuid": "uuid-B", "name": "uks-e2e-test-network" }
                    ]
                }
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/object-storage-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "uuid": "uuid-C", "name": "persistent-tf-acc-test-objsto" }
            ])))
            .mount(server)
            .await;

        mount_empty_listings(server).await;
    }

    #[tokio::test]
    async fn test_list_and_purge_end_to_end() {
        let server = MockServer::start().await;
        mount_scenario(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-A"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .with_priority(10)
            .expect(0)
            .mount(&server)
            .await;

        let api: Arc<dyn ResourceApi> = Arc::new(token_client(&server));
        let resources = ResourceLister::new(Arc::clone(&api))
            .list_resources(
                &["*tf-acc-test*".to_string()],
                &["*persistent*".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(resources, vec![resource(ResourceKind::Network, "uuid-A", "tf-acc-test-network")]);

        let summary = BulkDeleter::new(api, Arc::new(SilentProgress))
            .delete_all(resources)
            .await
            .unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.attempts, 1);
    }

    /// A transient conflict is retried after the delay
    #[tokio::test]
    async fn test_purge_retries_conflict() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-A"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": { "error_code": "NETWORK_IN_USE", "error_message": "The network is in use." }
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-A"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let options = PurgeOptions {
            concurrency: 2,
            retry_delay: Duration::from_millis(20),
            max_attempts: None,
        };
        let summary = BulkDeleter::new(Arc::new(token_client(&server)), Arc::new(SilentProgress))
            .with_options(options)
            .delete_all(vec![resource(ResourceKind::Network, "uuid-A", "tf-acc-test-network")])
            .await
            .unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.retries, 1);
        assert_eq!(summary.attempts, 2);
    }

    /// A hung DELETE times out and is retried instead of holding its slot
    #[tokio::test]
    async fn test_purge_retries_timed_out_request() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-A"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/network/uuid-A"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::with_timeout(
            &server.uri(),
            Credentials::Token("test-token".to_string()),
            Duration::from_millis(200),
        )
        .unwrap();
        let options = PurgeOptions {
            concurrency: 1,
            retry_delay: Duration::from_millis(20),
            max_attempts: None,
        };

        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            BulkDeleter::new(Arc::new(client), Arc::new(SilentProgress))
                .with_options(options)
                .delete_all(vec![resource(ResourceKind::Network, "uuid-A", "tf-acc-test-network")]),
        )
        .await
        .expect("purge should not hang on a slow request")
        .unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.retries, 1);
    }
}
