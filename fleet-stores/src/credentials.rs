//! Per-project, per-service credential storage (§3 "Service Credential").
//!
//! Masking (first 4 + last 4 characters of a secret, `***` in between)
//! is applied by [`mask_secret`] at the read boundary the operator HTTP
//! surface uses — the store itself always hands back plaintext to
//! trusted in-process callers (adapters need the real token).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A named external service this fleet integrates with.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Issue tracker (Jira-shaped).
    IssueTracker,
    /// Version control (GitLab-shaped).
    VersionControl,
    /// Design tool (Figma-shaped).
    DesignTool,
    /// Chat service (Slack-shaped).
    ChatService,
    /// Error-tracking monitoring.
    MonitoringIssues,
    /// Metrics/alerting monitoring.
    MonitoringMetrics,
}

/// A per-project, per-service credential row (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCredential {
    /// Vendor API base URL.
    pub base_url: String,
    /// Opaque secret (API token, personal access token, bot token).
    pub token: String,
    /// Vendor-specific option map (`external_project_id`, `org_slug`,
    /// `project_slug`, `app_key`, `default_channel`, `file_key`,
    /// `monitor_tags`).
    pub config: HashMap<String, serde_json::Value>,
    /// Whether this credential is currently usable.
    pub enabled: bool,
}

/// Mask a secret as its first 4 and last 4 characters with `***`
/// between them. Secrets of 8 characters or fewer are fully masked, to
/// avoid leaking most of a short token.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

/// Return `credential` with `token` and any of `config`'s
/// `app_key`/`api_key`/`secret` entries replaced by [`mask_secret`].
pub fn mask_credential(credential: &ServiceCredential) -> ServiceCredential {
    let mut masked = credential.clone();
    masked.token = mask_secret(&credential.token);
    for key in ["app_key", "api_key", "secret"] {
        if let Some(serde_json::Value::String(s)) = masked.config.get(key) {
            masked.config.insert(key.to_string(), serde_json::Value::String(mask_secret(s)));
        }
    }
    masked
}

/// Storage for [`ServiceCredential`] rows keyed by `(project, service)`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for `(project, service)`, if any.
    async fn get(&self, project: Option<i64>, service: ServiceKind) -> Option<ServiceCredential>;

    /// Insert or replace the credential for `(project, service)`.
    async fn put(&self, project: Option<i64>, service: ServiceKind, credential: ServiceCredential);

    /// All credentials for `service` across every project, enabled or
    /// not. Used by Chat Notifier's project-less fallback lookup.
    async fn list_for_service(&self, service: ServiceKind) -> Vec<(Option<i64>, ServiceCredential)>;
}

fn composite_key(project: Option<i64>, service: ServiceKind) -> String {
    let service_str = serde_json::to_string(&service).unwrap_or_else(|_| "unknown".to_string());
    format!("{project:?}\0{service_str}")
}

/// In-memory [`CredentialStore`], suitable for a single-process
/// deployment or tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    data: RwLock<HashMap<String, (Option<i64>, ServiceKind, ServiceCredential)>>,
}

impl MemoryCredentialStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, project: Option<i64>, service: ServiceKind) -> Option<ServiceCredential> {
        let key = composite_key(project, service);
        self.data.read().await.get(&key).map(|(_, _, c)| c.clone())
    }

    async fn put(&self, project: Option<i64>, service: ServiceKind, credential: ServiceCredential) {
        let key = composite_key(project, service);
        self.data.write().await.insert(key, (project, service, credential));
    }

    async fn list_for_service(&self, service: ServiceKind) -> Vec<(Option<i64>, ServiceCredential)> {
        self.data
            .read()
            .await
            .values()
            .filter(|(_, kind, _)| *kind == service)
            .map(|(project, _, credential)| (*project, credential.clone()))
            .collect()
    }
}
