mod helpers;

use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use platformer::config::{Project, Registry, RegistryCredentials, ReplicationRule, RobotAccount};
use platformer::error::ReconcileError;
use platformer::harbor::{configuration, project, registry, replication, robot};
use platformer::lookup::{IdLookup, Listing, ListingScan};
use platformer::reconcile::Action;

fn library() -> Project {
    Project {
        name: "library".into(),
        metadata: serde_json::from_value(json!({ "public": "true" })).unwrap(),
        replication_rules: Vec::new(),
    }
}

fn rule(repository: &str) -> ReplicationRule {
    ReplicationRule {
        repository: repository.into(),
        source_registry: "hub".into(),
        destination_namespace: "mirror".into(),
        crontab: "0 0 * * * *".into(),
    }
}

async fn mount_registry_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2.0/registries"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([
                { "name": "quay", "id": 1 },
                { "name": "hub", "id": 3 },
            ])),
        )
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Create -> 409 -> update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflict_updates_by_name_with_same_payload() {
    let server = MockServer::start().await;
    let expected = project::payload(&library());

    Mock::given(method("POST"))
        .and(path("/api/v2.0/projects"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v2.0/projects/library"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let applied = project::reconcile(&client, &library()).await.unwrap();

    assert_eq!(applied.action, Action::Updated);
    server.verify().await;
}

#[tokio::test]
async fn created_resource_is_not_updated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/projects"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let applied = project::reconcile(&client, &library()).await.unwrap();

    assert_eq!(applied.action, Action::Created);
    server.verify().await;
}

#[tokio::test]
async fn backend_error_is_reported_without_update() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/registries"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let hub = Registry {
        name: "hub".into(),
        url: "https://hub.docker.com".into(),
        kind: "docker-hub".into(),
        credentials: RegistryCredentials {
            access_key: "key".into(),
            access_secret: "secret".into(),
        },
        ..Registry::default()
    };
    let client = helpers::harbor_client(&server);
    let err = registry::reconcile(&client, &hub).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Backend { status: 500, ref detail, .. } if detail == "database down"
    ));
    server.verify().await;
}

#[tokio::test]
async fn configuration_is_one_put_per_key() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v2.0/configurations"))
        .and(body_json(json!({ "auth_mode": "oidc_auth" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let applied = configuration::apply(&client, "auth_mode", &json!("oidc_auth"))
        .await
        .unwrap();

    assert_eq!(applied.action, Action::Updated);
    server.verify().await;
}

// ---------------------------------------------------------------------------
// IdLookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listing_scan_resolves_exact_names_only() {
    let server = MockServer::start().await;
    mount_registry_listing(&server).await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);

    assert_eq!(lookup.resolve_id(Listing::Registries, "hub").await.unwrap(), Some(3));
    assert_eq!(lookup.resolve_id(Listing::Registries, "hu").await.unwrap(), None);
}

/// A full page of registries none of which is called `hub`.
fn full_page(offset: usize) -> serde_json::Value {
    (0..100)
        .map(|i| json!({ "name": format!("mirror-{}", offset + i), "id": offset + i }))
        .collect()
}

#[tokio::test]
async fn listing_scan_follows_later_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2.0/registries"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "hub", "id": 777 }])))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2.0/registries"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page(0)))
        .expect(1)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);

    assert_eq!(lookup.resolve_id(Listing::Registries, "hub").await.unwrap(), Some(777));
    server.verify().await;
}

#[tokio::test]
async fn listing_that_ignores_paging_terminates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2.0/registries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page(0)))
        .expect(2)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);

    assert_eq!(lookup.resolve_id(Listing::Registries, "hub").await.unwrap(), None);
    server.verify().await;
}

#[tokio::test]
async fn listing_that_is_not_an_array_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2.0/replication/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "errors": [{ "code": "UNKNOWN" }] })))
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);
    let err = lookup
        .resolve_id(Listing::ReplicationPolicies, "team-app")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Decode { kind: "replication policy", ref name, .. } if name == "team-app"
    ));
}

#[tokio::test]
async fn requests_carry_basic_auth_and_json_body() {
    let server = MockServer::start().await;
    let config = helpers::harbor_config(&server);

    Mock::given(method("POST"))
        .and(path("/api/v2.0/projects"))
        .and(basic_auth(config.credentials.username.as_str(), config.credentials.password.as_str()))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({ "project_name": "library" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let applied = project::reconcile(&client, &library()).await.unwrap();

    assert_eq!(applied.action, Action::Created);
    server.verify().await;
}

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_policy_is_named_from_repository_and_executed_once() {
    let server = MockServer::start().await;
    mount_registry_listing(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/replication/policies"))
        .and(body_partial_json(json!({
            "name": "team-app",
            "dest_namespace": "mirror",
            "src_registry": { "id": 3 },
            "trigger": { "type": "scheduled" },
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2.0/replication/policies"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "name": "team-app", "id": 42 }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2.0/replication/executions"))
        .and(body_json(json!({ "policy_id": 42 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);
    let applied = replication::reconcile(&client, &lookup, &rule("team/app"), None)
        .await
        .unwrap();

    assert_eq!(applied.action, Action::Created);
    server.verify().await;
}

#[tokio::test]
async fn updated_policy_is_not_executed() {
    let server = MockServer::start().await;
    mount_registry_listing(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/replication/policies"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v2.0/replication/policies/team-app"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2.0/replication/executions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);
    let applied = replication::reconcile(&client, &lookup, &rule("team/app"), None)
        .await
        .unwrap();

    assert_eq!(applied.action, Action::Updated);
    server.verify().await;
}

#[tokio::test]
async fn missing_source_registry_aborts_before_create() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2.0/registries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);
    let err = replication::reconcile(&client, &lookup, &rule("team/app"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::DependencyNotFound { kind: "registry", ref name } if name == "hub"
    ));
    server.verify().await;
}

#[tokio::test]
async fn project_rule_defaults_destination_to_project() {
    let server = MockServer::start().await;
    mount_registry_listing(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/replication/policies"))
        .and(body_partial_json(json!({ "dest_namespace": "library" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut nested = rule("nginx");
    nested.destination_namespace.clear();

    let client = helpers::harbor_client(&server);
    let lookup = ListingScan::new(&client);
    replication::reconcile(&client, &lookup, &nested, Some("library"))
        .await
        .unwrap();

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Robot accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issued_robot_secret_is_returned_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2.0/robots"))
        .and(body_partial_json(json!({
            "name": "argocd",
            "permissions": [{ "kind": "project", "namespace": "library" }],
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "name": "robot$argocd", "secret": "s3cr3t" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let account = RobotAccount {
        name: "argocd".into(),
        project: "library".into(),
        token: None,
    };
    let client = helpers::harbor_client(&server);
    let applied = robot::reconcile(&client, &account).await.unwrap();
    let credential = robot::issued_credential(&applied, &account).unwrap();

    assert_eq!(credential.name, "robot$argocd");
    assert_eq!(credential.secret, "s3cr3t");
    server.verify().await;
}
