mod common;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use std::sync::Arc;
use stratus_registry::{LoadSettingsError, NetworkKind, SettingsFetcher, classify_network};

struct Fixture {
    user_data: Value,
    settings_envelope: Value,
}

async fn user_data(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> Response {
    let flavor = headers
        .get("metadata-flavor")
        .and_then(|value| value.to_str().ok());
    if flavor != Some("Google") {
        return StatusCode::FORBIDDEN.into_response();
    }
    axum::Json(fixture.user_data.clone()).into_response()
}

async fn settings(State(fixture): State<Arc<Fixture>>) -> Response {
    axum::Json(fixture.settings_envelope.clone()).into_response()
}

/// Serves both the metadata endpoint and the registry from one server.
/// `build` receives the server base URL.
async fn metadata_server(build: impl FnOnce(&str) -> Fixture) -> SettingsFetcher {
    let server = common::TestServer::bind().await;
    let fixture = Arc::new(build(&server.base_url));
    let app = Router::new()
        .route("/computeMetadata/v1/instance/attributes/user_data", get(user_data))
        .route("/instances/vm-1/settings", get(settings))
        .with_state(fixture);
    let base_url = server.serve(app);

    SettingsFetcher::new()
        .unwrap()
        .metadata_url(format!(
            "{}/computeMetadata/v1/instance/attributes/user_data",
            base_url
        ))
}

fn agent_settings() -> Value {
    json!({
        "vm": { "id": "vm-1" },
        "agent_id": "agent-1",
        "networks": {
            "default": { "type": "dynamic" },
            "public": { "type": "vip", "ip": "203.0.113.10" }
        },
        "disks": { "system": "/dev/sda", "persistent": {} },
        "ntp": ["0.pool.ntp.org"]
    })
}

#[tokio::test]
async fn test_fetch_settings() {
    let fetcher = metadata_server(|base_url| Fixture {
        user_data: json!({
            "instance": { "name": "vm-1" },
            "registry": { "endpoint": base_url }
        }),
        settings_envelope: json!({ "status": "ok", "settings": agent_settings().to_string() }),
    })
    .await;

    let settings = fetcher.settings().await.unwrap();
    assert_eq!(settings.vm.id, "vm-1");
    assert_eq!(settings.agent_id, "agent-1");
    assert_eq!(settings.extra["ntp"], json!(["0.pool.ntp.org"]));

    let kinds: Vec<NetworkKind> = settings
        .networks
        .values()
        .map(|network| classify_network(network).unwrap())
        .collect();
    assert_eq!(kinds, vec![NetworkKind::Dynamic, NetworkKind::Vip]);
}

#[tokio::test]
async fn test_ip_endpoint_skips_dns_lookup() {
    let fetcher = metadata_server(|base_url| Fixture {
        user_data: json!({
            "instance": { "name": "vm-1" },
            "registry": { "endpoint": base_url },
            "dns": { "nameserver": ["192.0.2.53"] }
        }),
        settings_envelope: json!({ "settings": agent_settings().to_string() }),
    })
    .await;

    let user_data = fetcher.user_data().await.unwrap();
    let endpoint = fetcher.registry_endpoint(&user_data).await.unwrap();
    assert_eq!(Some(endpoint.as_str()), user_data.registry_endpoint());

    assert!(fetcher.settings().await.is_ok());
}

#[tokio::test]
async fn test_missing_registry_endpoint() {
    let fetcher = metadata_server(|_| Fixture {
        user_data: json!({ "instance": { "name": "vm-1" } }),
        settings_envelope: json!({}),
    })
    .await;

    let err = fetcher.settings().await.unwrap_err();
    assert!(matches!(err, LoadSettingsError::MissingRegistryEndpoint));
}

#[tokio::test]
async fn test_missing_instance_name() {
    let fetcher = metadata_server(|base_url| Fixture {
        user_data: json!({ "registry": { "endpoint": base_url } }),
        settings_envelope: json!({}),
    })
    .await;

    let err = fetcher.settings().await.unwrap_err();
    assert!(matches!(err, LoadSettingsError::MissingInstanceName));
}

#[tokio::test]
async fn test_registry_response_without_settings() {
    let fetcher = metadata_server(|base_url| Fixture {
        user_data: json!({
            "instance": { "name": "vm-1" },
            "registry": { "endpoint": base_url }
        }),
        settings_envelope: json!({ "status": "ok" }),
    })
    .await;

    let err = fetcher.settings().await.unwrap_err();
    assert!(matches!(err, LoadSettingsError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_settings_must_be_an_object() {
    let fetcher = metadata_server(|base_url| Fixture {
        user_data: json!({
            "instance": { "name": "vm-1" },
            "registry": { "endpoint": base_url }
        }),
        settings_envelope: json!({ "settings": "[1, 2, 3]" }),
    })
    .await;

    let err = fetcher.settings().await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid data: object expected, array provided");
}

#[tokio::test]
async fn test_metadata_errors_are_wrapped() {
    let base_url = common::TestServer::bind()
        .await
        .serve(Router::new());
    let fetcher = SettingsFetcher::new()
        .unwrap()
        .metadata_url(format!("{}/missing", base_url));

    let err = fetcher.user_data().await.unwrap_err();
    match err {
        LoadSettingsError::UserData(inner) => {
            assert!(matches!(*inner, LoadSettingsError::Status { status: 404, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
