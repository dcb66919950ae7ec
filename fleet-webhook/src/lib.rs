#![deny(missing_docs)]
//! # fleet-webhook — inbound webhook ingress and the operator HTTP surface
//!
//! Built on [`axum`], the same framework shape this workspace already
//! reaches for wherever an HTTP server adapter is needed. Routes are
//! thin: parse, translate to an [`fleet_core::event::Event`], publish,
//! reply. All business logic lives in `fleet-agents`.

pub mod ingest;
pub mod operator;
pub mod scope;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;
use state::AppState;
use std::sync::Arc;

/// Build the full router: webhook ingress plus the operator surface.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/issue-tracker", post(ingest::issue_tracker_webhook))
        .route("/webhooks/vcs", post(ingest::vcs_webhook))
        .route("/webhooks/design", post(ingest::design_webhook))
        .route("/agents/status", get(operator::agents_status))
        .route("/projects/{pid}/agents", get(operator::project_agents))
        .route("/projects/{pid}/agents/{name}", put(operator::update_agent_config))
        .route("/projects/{pid}/agents/{name}/trigger", post(operator::trigger_agent))
        .route("/projects/{pid}/agents/events", get(operator::project_events))
        .route(
            "/projects/{pid}/credentials/{kind}",
            get(operator::get_credential).put(operator::put_credential),
        )
        .route("/projects/{pid}/credentials/{kind}/reveal", get(operator::reveal_credential))
        .with_state(state)
}
