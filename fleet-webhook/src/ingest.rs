//! Inbound webhook translators (§6.1). Always replies 200 unless
//! signature verification is enabled and fails (401) — a slow or
//! errored downstream agent must never make the sending vendor retry
//! or alert.

use crate::scope::resolve_project;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use fleet_adapters::figma::verify_webhook_signature;
use fleet_core::event::{Event, EventKind};
use fleet_stores::credentials::ServiceKind;
use serde_json::Value;
use std::sync::Arc;

async fn publish(state: &AppState, kind: EventKind, payload: Value, source: &str, project: Option<i64>) {
    let event = Event::new(kind, payload, source, project);
    if let Err(err) = state.registry.bus().publish(event).await {
        tracing::warn!(%kind, error = %err, "webhook ingress failed to publish, returning 200 anyway");
    }
}

/// `POST /webhooks/issue-tracker` — Jira-shaped `issue_created`/`issue_updated`.
pub async fn issue_tracker_webhook(State(state): State<Arc<AppState>>, Json(payload): Json<Value>) -> impl IntoResponse {
    let webhook_event = payload.get("webhookEvent").and_then(|v| v.as_str()).unwrap_or_default();
    let kind = match webhook_event {
        "issue_created" => Some(EventKind::TicketCreated),
        "issue_updated" => Some(EventKind::TicketUpdated),
        _ => None,
    };

    if let Some(kind) = kind {
        let project_key = payload
            .get("issue")
            .and_then(|i| i.get("fields"))
            .and_then(|f| f.get("project"))
            .and_then(|p| p.get("key"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let project = resolve_project(state.credentials.as_ref(), ServiceKind::IssueTracker, "external_project_id", project_key).await;
        publish(&state, kind, payload, "issue_tracker_webhook", project).await;
    }

    StatusCode::OK
}

fn is_main_ref(git_ref: &str) -> bool {
    git_ref.ends_with("/main") || git_ref.ends_with("/master")
}

/// `POST /webhooks/vcs` — GitLab-shaped push/merge-request/pipeline hooks.
pub async fn vcs_webhook(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(payload): Json<Value>) -> impl IntoResponse {
    let event_header = headers.get("X-Gitlab-Event").and_then(|v| v.to_str().ok()).unwrap_or_default();
    let external_project_id = payload.get("project").and_then(|p| p.get("id")).map(|v| v.to_string()).unwrap_or_default();
    let project =
        resolve_project(state.credentials.as_ref(), ServiceKind::VersionControl, "external_project_id", &external_project_id).await;

    let kind = match event_header {
        "Push Hook" => {
            let git_ref = payload.get("ref").and_then(|v| v.as_str()).unwrap_or_default();
            Some(if is_main_ref(git_ref) { EventKind::MergeToMain } else { EventKind::CodePushed })
        }
        "Merge Request Hook" => {
            let attrs = payload.get("object_attributes");
            let action = attrs.and_then(|a| a.get("action")).and_then(|v| v.as_str()).unwrap_or_default();
            let work_in_progress = attrs.and_then(|a| a.get("work_in_progress")).and_then(|v| v.as_bool()).unwrap_or(false);
            let target_branch = attrs.and_then(|a| a.get("target_branch")).and_then(|v| v.as_str()).unwrap_or_default();
            match action {
                "open" => Some(EventKind::PrOpened),
                "update" if !work_in_progress => Some(EventKind::PrReadyForReview),
                "approved" => Some(EventKind::PrApproved),
                "merge" if is_main_ref(&format!("refs/heads/{target_branch}")) => Some(EventKind::MergeToMain),
                _ => None,
            }
        }
        "Pipeline Hook" => {
            let status = payload.get("object_attributes").and_then(|a| a.get("status")).and_then(|v| v.as_str()).unwrap_or_default();
            match status {
                "running" => Some(EventKind::PipelineStarted),
                "success" => Some(EventKind::PipelineCompleted),
                "failed" => Some(EventKind::PipelineFailed),
                _ => None,
            }
        }
        _ => None,
    };

    if let Some(kind) = kind {
        publish(&state, kind, payload, "gitlab_webhook", project).await;
    }

    StatusCode::OK
}

/// `POST /webhooks/design` — Figma-shaped `FILE_UPDATE`, optionally
/// HMAC-signed via `design_webhook_secret`.
pub async fn design_webhook(State(state): State<Arc<AppState>>, headers: HeaderMap, body: axum::body::Bytes) -> impl IntoResponse {
    if let Some(secret) = &state.config.design_webhook_secret {
        let signature = headers.get("X-Figma-Signature").and_then(|v| v.to_str().ok()).unwrap_or_default();
        if !verify_webhook_signature(secret, &body, signature) {
            return StatusCode::UNAUTHORIZED;
        }
    }

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::OK;
    };

    let event_type = payload.get("event_type").and_then(|v| v.as_str()).unwrap_or_default();
    if event_type == "FILE_UPDATE" {
        let file_key = payload.get("file_key").and_then(|v| v.as_str()).unwrap_or_default();
        let project = resolve_project(state.credentials.as_ref(), ServiceKind::DesignTool, "file_key", file_key).await;
        publish(&state, EventKind::DesignChanged, payload, "figma_webhook", project).await;
    }

    StatusCode::OK
}
