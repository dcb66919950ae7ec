//! `IssueTracker` over the Jira Cloud REST API.

use crate::error::{map_reqwest_error, map_status, AdapterError};
use crate::traits::{Issue, IssueTracker};
use async_trait::async_trait;
use std::time::Duration;

/// `IssueTracker` backed by a Jira Cloud project.
pub struct JiraIssueTracker {
    base_url: String,
    project_key: String,
    email: String,
    api_token: String,
    client: reqwest::Client,
}

impl JiraIssueTracker {
    /// `base_url` is the site root (e.g. `https://acme.atlassian.net`);
    /// Jira Cloud authenticates with basic auth over `email`/`api_token`.
    pub fn new(
        base_url: impl Into<String>,
        project_key: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            project_key: project_key.into(),
            email: email.into(),
            api_token: api_token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/rest/api/3{}", self.base_url, suffix)
    }
}

#[async_trait]
impl IssueTracker for JiraIssueTracker {
    async fn create_issue(&self, title: &str, description: &str, labels: &[String]) -> Result<Issue, AdapterError> {
        let body = serde_json::json!({
            "fields": {
                "project": {"key": self.project_key},
                "summary": title,
                "description": description,
                "issuetype": {"name": "Task"},
                "labels": labels,
            }
        });
        tracing::debug!(project = %self.project_key, "creating jira issue");
        let response = self
            .client
            .post(self.url("/issue"))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "create_issue"))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, "create_issue"))?;
        if !status.is_success() {
            return Err(map_status(status, &text, "create_issue"));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        let key = json.get("key").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        Ok(Issue { key, title: title.to_string(), status: "open".to_string() })
    }

    async fn transition(&self, key: &str, status: &str) -> Result<(), AdapterError> {
        let transitions_url = self.url(&format!("/issue/{key}/transitions"));
        let response = self
            .client
            .get(&transitions_url)
            .basic_auth(&self.email, Some(&self.api_token))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "transition"))?;
        let status_code = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, "transition"))?;
        if !status_code.is_success() {
            return Err(map_status(status_code, &text, "transition"));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        let transition_id = json
            .get("transitions")
            .and_then(|t| t.as_array())
            .and_then(|list| list.iter().find(|t| t.get("name").and_then(|n| n.as_str()) == Some(status)))
            .and_then(|t| t.get("id"))
            .and_then(|id| id.as_str())
            .ok_or_else(|| AdapterError::NotFound(format!("no transition named {status} on {key}")))?
            .to_string();

        let body = serde_json::json!({"transition": {"id": transition_id}});
        let response = self
            .client
            .post(&transitions_url)
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "transition"))?;
        let status_code = response.status();
        if !status_code.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status_code, &text, "transition"));
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Issue>, AdapterError> {
        let jql = format!("project = {} AND {}", self.project_key, query);
        let response = self
            .client
            .get(self.url("/search"))
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[("jql", jql.as_str())])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "search"))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, "search"))?;
        if !status.is_success() {
            return Err(map_status(status, &text, "search"));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        let issues = json
            .get("issues")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| {
                Some(Issue {
                    key: i.get("key")?.as_str()?.to_string(),
                    title: i.get("fields")?.get("summary")?.as_str()?.to_string(),
                    status: i.get("fields")?.get("status")?.get("name")?.as_str()?.to_string(),
                })
            })
            .collect();
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_suffix() {
        let tracker = JiraIssueTracker::new("https://acme.atlassian.net", "SHIP", "a@b.com", "tok");
        assert_eq!(tracker.url("/issue"), "https://acme.atlassian.net/rest/api/3/issue");
    }
}
