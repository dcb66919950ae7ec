//! `VersionControl` over the GitLab REST v4 API.

use crate::error::{map_reqwest_error, map_status, AdapterError};
use crate::traits::{Commit, FileChange, MergeRequest, Pipeline, ProjectMember, VersionControl};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// `VersionControl` backed by a GitLab project.
pub struct GitlabVersionControl {
    base_url: String,
    project_id: String,
    token: String,
    client: reqwest::Client,
}

impl GitlabVersionControl {
    /// `base_url` is the GitLab instance root (e.g. `https://gitlab.com`),
    /// `project_id` the numeric or URL-encoded path project id, `token` a
    /// private/project access token sent as `PRIVATE-TOKEN`.
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn projects_url(&self, suffix: &str) -> String {
        format!("{}/api/v4/projects/{}{}", self.base_url, self.project_id, suffix)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: String,
        body: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value, AdapterError> {
        tracing::debug!(url = %url, method = %method, "gitlab adapter request");
        let mut request = self.client.request(method, &url).header("PRIVATE-TOKEN", &self.token).timeout(timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| map_reqwest_error(e, &url))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, &url))?;
        if !status.is_success() {
            return Err(map_status(status, &text, &url));
        }
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(format!("{url}: {e}")))
    }
}

#[async_trait]
impl VersionControl for GitlabVersionControl {
    async fn create_branch(&self, branch: &str, source_ref: &str) -> Result<(), AdapterError> {
        let body = serde_json::json!({"branch": branch, "ref": source_ref});
        self.request(
            reqwest::Method::POST,
            self.projects_url("/repository/branches"),
            Some(body),
            Duration::from_secs(30),
        )
        .await?;
        Ok(())
    }

    async fn create_file(&self, branch: &str, file: &FileChange, commit_message: &str) -> Result<(), AdapterError> {
        let body = serde_json::json!({
            "branch": branch,
            "content": file.content,
            "commit_message": commit_message,
        });
        let url = self.projects_url(&format!("/repository/files/{}", urlencode(&file.path)));
        self.request(reqwest::Method::POST, url, Some(body), Duration::from_secs(30)).await?;
        Ok(())
    }

    async fn create_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
        reviewer_ids: &[i64],
    ) -> Result<MergeRequest, AdapterError> {
        let body = serde_json::json!({
            "source_branch": source_branch,
            "target_branch": target_branch,
            "title": title,
            "description": description,
            "reviewer_ids": reviewer_ids,
        });
        let json = self
            .request(reqwest::Method::POST, self.projects_url("/merge_requests"), Some(body), Duration::from_secs(30))
            .await?;
        Ok(MergeRequest {
            iid: json.get("iid").and_then(|v| v.as_i64()).unwrap_or(0),
            web_url: json.get("web_url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
    }

    async fn get_diff(&self, mr_iid: i64) -> Result<String, AdapterError> {
        let json = self
            .request(
                reqwest::Method::GET,
                self.projects_url(&format!("/merge_requests/{mr_iid}/diffs")),
                None,
                Duration::from_secs(30),
            )
            .await?;
        let diffs = json.as_array().cloned().unwrap_or_default();
        let combined: String = diffs
            .iter()
            .filter_map(|d| d.get("diff").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(combined)
    }

    async fn add_mr_comment(&self, mr_iid: i64, body: &str) -> Result<(), AdapterError> {
        let payload = serde_json::json!({"body": body});
        self.request(
            reqwest::Method::POST,
            self.projects_url(&format!("/merge_requests/{mr_iid}/notes")),
            Some(payload),
            Duration::from_secs(30),
        )
        .await?;
        Ok(())
    }

    async fn merge(&self, mr_iid: i64) -> Result<(), AdapterError> {
        self.request(
            reqwest::Method::PUT,
            self.projects_url(&format!("/merge_requests/{mr_iid}/merge")),
            None,
            Duration::from_secs(30),
        )
        .await?;
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<ProjectMember>, AdapterError> {
        let json = self
            .request(reqwest::Method::GET, self.projects_url("/members/all"), None, Duration::from_secs(30))
            .await?;
        let members = json
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                Some(ProjectMember {
                    id: m.get("id")?.as_i64()?,
                    username: m.get("username")?.as_str()?.to_string(),
                    access_level: m.get("access_level")?.as_i64()? as i32,
                })
            })
            .collect();
        Ok(members)
    }

    async fn get_pipelines(&self, git_ref: Option<&str>) -> Result<Vec<Pipeline>, AdapterError> {
        let mut url = self.projects_url("/pipelines");
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={}", urlencode(git_ref)));
        }
        let json = self.request(reqwest::Method::GET, url, None, Duration::from_secs(30)).await?;
        let pipelines = json
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                Some(Pipeline {
                    id: p.get("id")?.as_i64()?,
                    status: p.get("status")?.as_str()?.to_string(),
                    git_ref: p.get("ref")?.as_str()?.to_string(),
                })
            })
            .collect();
        Ok(pipelines)
    }

    async fn trigger_pipeline(
        &self,
        git_ref: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Pipeline, AdapterError> {
        let variables: Vec<_> = variables
            .iter()
            .map(|(key, value)| serde_json::json!({"key": key, "value": value}))
            .collect();
        let body = serde_json::json!({"ref": git_ref, "variables": variables});
        let json = self
            .request(reqwest::Method::POST, self.projects_url("/pipeline"), Some(body), Duration::from_secs(30))
            .await?;
        Ok(Pipeline {
            id: json.get("id").and_then(|v| v.as_i64()).unwrap_or(0),
            status: json.get("status").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
            git_ref: git_ref.to_string(),
        })
    }

    async fn create_discussion(&self, mr_iid: i64, body: &str) -> Result<(), AdapterError> {
        let payload = serde_json::json!({"body": body});
        self.request(
            reqwest::Method::POST,
            self.projects_url(&format!("/merge_requests/{mr_iid}/discussions")),
            Some(payload),
            Duration::from_secs(30),
        )
        .await?;
        Ok(())
    }

    async fn get_commits(&self, git_ref: &str, limit: u32) -> Result<Vec<Commit>, AdapterError> {
        let url = self.projects_url(&format!("/repository/commits?ref_name={}&per_page={limit}", urlencode(git_ref)));
        let json = self.request(reqwest::Method::GET, url, None, Duration::from_secs(30)).await?;
        let commits = json
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| {
                Some(Commit {
                    sha: c.get("id")?.as_str()?.to_string(),
                    message: c.get("message")?.as_str()?.to_string(),
                })
            })
            .collect();
        Ok(commits)
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u32),
        })
        .collect()
}
