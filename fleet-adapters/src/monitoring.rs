//! `MonitoringIssues` over a Sentry-shaped error-tracking API and
//! `MonitoringMetrics` over a Datadog-shaped metrics API.

use crate::error::{map_reqwest_error, map_status, AdapterError};
use crate::traits::{Monitor, MonitoringIssue, MonitoringIssues, MonitoringMetrics};
use async_trait::async_trait;
use std::time::Duration;

/// `MonitoringIssues` backed by a Sentry organization/project.
pub struct SentryMonitoringIssues {
    base_url: String,
    org_slug: String,
    project_slug: String,
    token: String,
    client: reqwest::Client,
}

impl SentryMonitoringIssues {
    /// `base_url` defaults to `https://sentry.io` in production.
    pub fn new(
        base_url: impl Into<String>,
        org_slug: impl Into<String>,
        project_slug: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            org_slug: org_slug.into(),
            project_slug: project_slug.into(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MonitoringIssues for SentryMonitoringIssues {
    async fn list_recent_unresolved(&self, window_minutes: u32) -> Result<Vec<MonitoringIssue>, AdapterError> {
        let url = format!(
            "{}/api/0/projects/{}/{}/issues/?query=is:unresolved&statsPeriod={window_minutes}m",
            self.base_url, self.org_slug, self.project_slug
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &url))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, &url))?;
        if !status.is_success() {
            return Err(map_status(status, &text, &url));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(format!("{url}: {e}")))?;
        let issues = json
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| {
                Some(MonitoringIssue {
                    id: i.get("id")?.as_str()?.to_string(),
                    title: i.get("title")?.as_str()?.to_string(),
                    event_count: i.get("count")?.as_str()?.parse().unwrap_or(0),
                })
            })
            .collect();
        Ok(issues)
    }
}

/// `MonitoringMetrics` backed by a Datadog organization.
pub struct DatadogMonitoringMetrics {
    base_url: String,
    api_key: String,
    app_key: String,
    client: reqwest::Client,
}

impl DatadogMonitoringMetrics {
    /// `base_url` defaults to `https://api.datadoghq.com` in production.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into(), app_key: app_key.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl MonitoringMetrics for DatadogMonitoringMetrics {
    async fn list_alerting_monitors(&self) -> Result<Vec<Monitor>, AdapterError> {
        let url = format!("{}/api/v1/monitor?group_states=alert", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &url))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, &url))?;
        if !status.is_success() {
            return Err(map_status(status, &text, &url));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(format!("{url}: {e}")))?;
        let monitors = json
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                Some(Monitor {
                    id: m.get("id")?.as_i64()?.to_string(),
                    name: m.get("name")?.as_str()?.to_string(),
                    status: m.get("overall_state")?.as_str()?.to_string(),
                })
            })
            .filter(|m| m.status.eq_ignore_ascii_case("alert"))
            .collect();
        Ok(monitors)
    }
}
