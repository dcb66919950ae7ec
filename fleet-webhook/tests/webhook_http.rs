//! Router-level tests: HMAC verification on the design webhook and
//! credential masking on the operator surface, driven through the
//! actual axum [`fleet_webhook::router`] rather than calling handlers
//! directly.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fleet_core::audit::AuditStore;
use fleet_core::bus::EventBus;
use fleet_core::config::FleetConfig;
use fleet_core::registry::AgentRegistry;
use fleet_stores::agent_config::MemoryAgentConfigStore;
use fleet_stores::audit::MemoryAuditStore;
use fleet_stores::credentials::{CredentialStore, MemoryCredentialStore, ServiceCredential, ServiceKind};
use fleet_webhook::state::AppState;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn test_state(design_webhook_secret: Option<&str>) -> Arc<AppState> {
    let bus = EventBus::new(10, 4);
    let registry = Arc::new(AgentRegistry::new(bus.clone()));
    let credentials = Arc::new(MemoryCredentialStore::new());
    let agent_configs = Arc::new(MemoryAgentConfigStore::new());
    let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
    let mut config = FleetConfig::default();
    config.design_webhook_secret = design_webhook_secret.map(str::to_string);
    Arc::new(AppState { registry, credentials, agent_configs, audit, config })
}

#[tokio::test]
async fn design_webhook_rejects_missing_signature_when_secret_configured() {
    let state = test_state(Some("shh")).await;
    let app = fleet_webhook::router(state);
    let body = r#"{"event_type":"FILE_UPDATE","file_key":"abc"}"#;
    let request = Request::builder().method("POST").uri("/webhooks/design").body(Body::from(body)).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn design_webhook_accepts_valid_signature() {
    let secret = "shh";
    let state = test_state(Some(secret)).await;
    let app = fleet_webhook::router(state);
    let body = r#"{"event_type":"FILE_UPDATE","file_key":"abc"}"#;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    let signature = hex_encode(&mac.finalize().into_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/design")
        .header("X-Figma-Signature", signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn design_webhook_without_configured_secret_skips_verification() {
    let state = test_state(None).await;
    let app = fleet_webhook::router(state);
    let body = r#"{"event_type":"FILE_UPDATE","file_key":"abc"}"#;
    let request = Request::builder().method("POST").uri("/webhooks/design").body(Body::from(body)).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_credential_masks_token_in_response_body() {
    let state = test_state(None).await;
    state
        .credentials
        .put(
            Some(1),
            ServiceKind::VersionControl,
            ServiceCredential {
                base_url: "https://gitlab.example.com".to_string(),
                token: "glpat-1234567890abcdef".to_string(),
                config: HashMap::new(),
                enabled: true,
            },
        )
        .await;
    let app = fleet_webhook::router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/projects/1/credentials/version_control")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let masked = body["token"].as_str().unwrap();
    assert!(!masked.contains("1234567890"));
    assert!(masked.starts_with("glpa"));
}
