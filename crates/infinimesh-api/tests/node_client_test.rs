#![allow(clippy::unwrap_used)]
// Integration tests for `NodeClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::collections::BTreeMap;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use infinimesh_api::models::{DevicesTokenRequest, Level, Shadow, State};
use infinimesh_api::{Error, NodeClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NodeClient) {
    let server = MockServer::start().await;
    let client = NodeClient::new(
        Url::parse(&server.uri()).unwrap(),
        &SecretString::from("account-secret"),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn scoped(token: &str) -> SecretString {
    SecretString::from(token)
}

// ── Device directory ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_uses_account_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.DevicesService/List"))
        .and(header("authorization", "Bearer account-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                {
                    "uuid": "d-1",
                    "title": "Boiler",
                    "enabled": true,
                    "basicEnabled": true,
                    "tags": ["heating"],
                    "access": { "level": "MGMT", "namespace": "home" }
                },
                { "uuid": "d-2", "title": "Porch light" }
            ],
            "total": "2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.list_devices().await.unwrap();

    assert_eq!(resp.total, Some(2));
    assert_eq!(resp.devices.len(), 2);
    assert_eq!(resp.devices[0].title, "Boiler");
    assert_eq!(resp.devices[0].tags, vec!["heating".to_string()]);
    assert!(resp.devices[1].access.is_none());
    assert!(!resp.devices[1].enabled);
}

#[tokio::test]
async fn test_make_devices_token_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.DevicesService/MakeDevicesToken"))
        .and(body_json(json!({
            "devices": { "d-1": "MGMT" },
            "post": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "scoped-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut devices = BTreeMap::new();
    devices.insert("d-1".to_string(), Level::Mgmt);
    let token = client
        .make_devices_token(&DevicesTokenRequest {
            devices,
            post: true,
        })
        .await
        .unwrap();

    assert_eq!(token.expose_secret(), "scoped-1");
}

// ── Shadow service ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_shadows_overrides_authorization() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.ShadowService/Get"))
        .and(header("authorization", "Bearer scoped-read"))
        .and(body_json(json!({ "pool": ["d-1", "d-2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "shadows": [
                {
                    "device": "d-1",
                    "reported": { "data": { "temp": 21.5 }, "timestamp": "2024-03-01T10:00:00Z" },
                    "desired": { "data": {} },
                    "connection": { "connected": true }
                },
                { "device": "d-2" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let shadows = client
        .get_shadows(&scoped("scoped-read"), vec!["d-1".into(), "d-2".into()])
        .await
        .unwrap();

    assert_eq!(shadows.len(), 2);
    let reported = shadows[0].reported.as_ref().unwrap();
    assert_eq!(reported.data["temp"], json!(21.5));
    assert_eq!(shadows[0].connection.as_ref().unwrap()["connected"], json!(true));
    assert_eq!(shadows[1].reported, None);
}

#[tokio::test]
async fn test_patch_shadow_sends_only_the_patched_field() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.ShadowService/Patch"))
        .and(header("authorization", "Bearer scoped-mgmt"))
        .and(body_json(json!({
            "device": "d-1",
            "desired": { "data": { "target": 22 } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": "d-1",
            "desired": { "data": { "target": 22 }, "timestamp": "2024-03-01T10:00:05Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut data = serde_json::Map::new();
    data.insert("target".into(), json!(22));
    let patch = Shadow {
        device: "d-1".into(),
        desired: Some(State {
            data,
            ..State::default()
        }),
        ..Shadow::default()
    };

    let echoed = client.patch_shadow(&scoped("scoped-mgmt"), &patch).await.unwrap();
    assert_eq!(echoed.device, "d-1");
    assert!(echoed.desired.unwrap().timestamp.is_some());
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.DevicesService/List"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthenticated",
            "message": "Session is expired"
        })))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { ref message } if message == "Session is expired"));
    assert!(err.is_auth_expired());
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.ShadowService/Get"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client
        .get_shadows(&scoped("stale"), vec!["d-9".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_server_error_keeps_rpc_code() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.ShadowService/Patch"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": "unavailable",
            "message": "shadow store is down"
        })))
        .mount(&server)
        .await;

    let err = client
        .patch_shadow(
            &scoped("scoped-mgmt"),
            &Shadow {
                device: "d-1".into(),
                ..Shadow::default()
            },
        )
        .await
        .unwrap_err();

    match &err {
        Error::Rpc {
            message,
            code,
            status,
        } => {
            assert_eq!(message, "shadow store is down");
            assert_eq!(code.as_deref(), Some("unavailable"));
            assert_eq!(*status, 503);
        }
        other => panic!("expected Rpc, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/infinimesh.node.DevicesService/MakeDevicesToken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client
        .make_devices_token(&DevicesTokenRequest {
            devices: BTreeMap::new(),
            post: false,
        })
        .await
        .unwrap_err();

    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>proxy</html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
