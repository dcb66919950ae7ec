//! Operator HTTP surface (§6.3): fleet status, per-project agent
//! config, manual triggering, filtered event history, and masked
//! credential CRUD.

use crate::state::AppState;
use axum::extract::{Path, Query};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fleet_core::event::{Event, EventKind};
use fleet_stores::agent_config::AgentConfigStore;
use fleet_stores::credentials::{mask_credential, CredentialStore, ServiceCredential, ServiceKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// `GET /agents/status`
pub async fn agents_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.status().await)
}

/// `GET /projects/{pid}/agents`
pub async fn project_agents(State(state): State<Arc<AppState>>, Path(pid): Path<i64>) -> impl IntoResponse {
    let mut out = Vec::new();
    for descriptor in state.registry.status().await {
        let config = state.agent_configs.get(Some(pid), &descriptor.name).await.unwrap_or_default();
        out.push(json!({"agent": descriptor, "config": config}));
    }
    Json(out)
}

/// Body of `PUT /projects/{pid}/agents/{name}`. Both fields optional —
/// omitting one leaves that part of the row unchanged.
#[derive(Deserialize)]
pub struct AgentConfigUpdate {
    enabled: Option<bool>,
    config: Option<std::collections::HashMap<String, Value>>,
}

/// `PUT /projects/{pid}/agents/{name}`
pub async fn update_agent_config(
    State(state): State<Arc<AppState>>,
    Path((pid, name)): Path<(i64, String)>,
    Json(body): Json<AgentConfigUpdate>,
) -> impl IntoResponse {
    let mut current = state.agent_configs.get(Some(pid), &name).await.unwrap_or_default();
    if let Some(enabled) = body.enabled {
        current.enabled = enabled;
        if enabled {
            state.registry.enable(&name).await;
        } else {
            state.registry.disable(&name).await;
        }
    }
    if let Some(options) = body.config {
        current.options = options;
    }
    state.agent_configs.put(Some(pid), &name, current.clone()).await;
    Json(current)
}

fn demo_defaults(agent_name: &str) -> Value {
    match agent_name {
        "product_intelligence" => json!({"ticket_key": "DEMO-1", "summary": "Demo ticket"}),
        "design_sync" => json!({"file_key": "demo-file", "component_name": "Button"}),
        "code_orchestration" => json!({"ticket_key": "DEMO-1", "summary": "Demo ticket"}),
        "security_compliance" => json!({"mr_iid": 0}),
        "test_intelligence" => json!({"mr_iid": 0}),
        "review_coordination" => json!({"mr_iid": 0, "description": "Demo merge request"}),
        "deployment_orchestrator" => json!({}),
        "analytics_insights" => json!({"done": 0, "total": 0}),
        "chat_notifier" => json!({"text": "Demo notification"}),
        _ => json!({}),
    }
}

fn shallow_merge(base: Value, overrides: Value) -> Value {
    let Value::Object(mut base) = base else { return overrides };
    let Value::Object(overrides) = overrides else { return Value::Object(base) };
    for (k, v) in overrides {
        base.insert(k, v);
    }
    Value::Object(base)
}

/// Body of `POST /projects/{pid}/agents/{name}/trigger`. `event_data`
/// is merged over the agent's built-in demo defaults, caller wins.
#[derive(Deserialize)]
pub struct TriggerBody {
    #[serde(default)]
    event_data: Value,
}

/// `POST /projects/{pid}/agents/{name}/trigger`
pub async fn trigger_agent(
    State(state): State<Arc<AppState>>,
    Path((pid, name)): Path<(i64, String)>,
    Json(body): Json<TriggerBody>,
) -> impl IntoResponse {
    let Some(descriptor) = state.registry.status().await.into_iter().find(|d| d.name == name) else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown agent"}))).into_response();
    };
    let Some(kind) = descriptor.subscribed_kinds.first().copied() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "agent has no subscribed kinds"}))).into_response();
    };

    let payload = shallow_merge(demo_defaults(&name), body.event_data);
    let event = Event::new(kind, payload, "manual_trigger", Some(pid));
    let id = event.id;
    if let Err(err) = state.registry.bus().publish(event).await {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": err.to_string()}))).into_response();
    }
    (StatusCode::ACCEPTED, Json(json!({"event_id": id.to_string(), "kind": kind}))).into_response()
}

/// Query params of `GET /projects/{pid}/agents/events`.
#[derive(Deserialize)]
pub struct EventsQuery {
    limit: Option<usize>,
    kind: Option<EventKind>,
}

/// `GET /projects/{pid}/agents/events?limit=N`
pub async fn project_events(State(state): State<Arc<AppState>>, Path(pid): Path<i64>, Query(query): Query<EventsQuery>) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100);
    let records = state.audit.recent(Some(pid), query.kind, limit).await;
    Json(records)
}

/// `GET /projects/{pid}/credentials/{kind}` — masked.
pub async fn get_credential(State(state): State<Arc<AppState>>, Path((pid, kind)): Path<(i64, ServiceKind)>) -> impl IntoResponse {
    match state.credentials.get(Some(pid), kind).await {
        Some(credential) => (StatusCode::OK, Json(mask_credential(&credential))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `GET /projects/{pid}/credentials/{kind}/reveal` — unmasked.
pub async fn reveal_credential(State(state): State<Arc<AppState>>, Path((pid, kind)): Path<(i64, ServiceKind)>) -> impl IntoResponse {
    match state.credentials.get(Some(pid), kind).await {
        Some(credential) => (StatusCode::OK, Json(credential)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `PUT /projects/{pid}/credentials/{kind}`
pub async fn put_credential(
    State(state): State<Arc<AppState>>,
    Path((pid, kind)): Path<(i64, ServiceKind)>,
    Json(credential): Json<ServiceCredential>,
) -> impl IntoResponse {
    state.credentials.put(Some(pid), kind, credential.clone()).await;
    Json(mask_credential(&credential))
}
