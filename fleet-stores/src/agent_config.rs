//! Per-project, per-agent configuration storage (§3 "Agent Config").
//!
//! A missing row means "default enabled, empty options" — callers
//! should treat [`AgentConfigStore::get`] returning `None` as that
//! default rather than as an absence of the agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A per-project, per-agent configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether this agent is enabled for this project.
    pub enabled: bool,
    /// Arbitrary per-agent, per-project option map.
    pub options: HashMap<String, serde_json::Value>,
    /// Wall-clock milliseconds of the agent's last run for this project.
    pub last_run_at: Option<u64>,
    /// Running count of events processed for this project.
    pub total_events_processed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { enabled: true, options: HashMap::new(), last_run_at: None, total_events_processed: 0 }
    }
}

/// Storage for [`AgentConfig`] rows keyed by `(project, agent_name)`.
#[async_trait]
pub trait AgentConfigStore: Send + Sync {
    /// Fetch the config row for `(project, agent_name)`, if a row has
    /// ever been written for it.
    async fn get(&self, project: Option<i64>, agent_name: &str) -> Option<AgentConfig>;

    /// Insert or replace the config row for `(project, agent_name)`.
    async fn put(&self, project: Option<i64>, agent_name: &str, config: AgentConfig);

    /// Every `(project, agent_name)` pair with a row, for a given agent.
    /// Used by the scheduler's per-project analytics fan-out.
    async fn projects_for_agent(&self, agent_name: &str) -> Vec<Option<i64>>;

    /// Record a successful run: bump `total_events_processed` and set
    /// `last_run_at`, creating a default-enabled row first if none
    /// exists.
    async fn record_run(&self, project: Option<i64>, agent_name: &str, at_millis: u64);
}

fn composite_key(project: Option<i64>, agent_name: &str) -> String {
    format!("{project:?}\0{agent_name}")
}

/// In-memory [`AgentConfigStore`].
#[derive(Default)]
pub struct MemoryAgentConfigStore {
    data: RwLock<HashMap<String, (Option<i64>, String, AgentConfig)>>,
}

impl MemoryAgentConfigStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentConfigStore for MemoryAgentConfigStore {
    async fn get(&self, project: Option<i64>, agent_name: &str) -> Option<AgentConfig> {
        let key = composite_key(project, agent_name);
        self.data.read().await.get(&key).map(|(_, _, c)| c.clone())
    }

    async fn put(&self, project: Option<i64>, agent_name: &str, config: AgentConfig) {
        let key = composite_key(project, agent_name);
        self.data.write().await.insert(key, (project, agent_name.to_string(), config));
    }

    async fn projects_for_agent(&self, agent_name: &str) -> Vec<Option<i64>> {
        self.data
            .read()
            .await
            .values()
            .filter(|(_, name, _)| name == agent_name)
            .map(|(project, _, _)| *project)
            .collect()
    }

    async fn record_run(&self, project: Option<i64>, agent_name: &str, at_millis: u64) {
        let key = composite_key(project, agent_name);
        let mut data = self.data.write().await;
        let entry = data
            .entry(key)
            .or_insert_with(|| (project, agent_name.to_string(), AgentConfig::default()));
        entry.2.last_run_at = Some(at_millis);
        entry.2.total_events_processed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn agent_config_store_is_object_safe_send_sync() {
        _assert_send_sync::<Arc<dyn AgentConfigStore>>();
    }

    #[test]
    fn default_config_is_enabled_with_no_options() {
        let config = AgentConfig::default();
        assert!(config.enabled);
        assert!(config.options.is_empty());
    }

    #[tokio::test]
    async fn missing_row_returns_none_not_default() {
        let store = MemoryAgentConfigStore::new();
        assert!(store.get(Some(1), "code_orchestration").await.is_none());
    }

    #[tokio::test]
    async fn record_run_creates_default_row_and_increments() {
        let store = MemoryAgentConfigStore::new();
        store.record_run(Some(1), "analytics_insights", 1000).await;
        store.record_run(Some(1), "analytics_insights", 2000).await;
        let config = store.get(Some(1), "analytics_insights").await.unwrap();
        assert_eq!(config.total_events_processed, 2);
        assert_eq!(config.last_run_at, Some(2000));
    }

    #[tokio::test]
    async fn projects_for_agent_lists_only_matching_rows() {
        let store = MemoryAgentConfigStore::new();
        store.put(Some(1), "analytics_insights", AgentConfig::default()).await;
        store.put(Some(2), "analytics_insights", AgentConfig::default()).await;
        store.put(Some(1), "chat_notifier", AgentConfig::default()).await;
        let mut projects = store.projects_for_agent("analytics_insights").await;
        projects.sort();
        assert_eq!(projects, vec![Some(1), Some(2)]);
    }
}
