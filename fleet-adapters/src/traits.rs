//! Capability traits: the abstract boundary between agent logic and a
//! vendor's API shape (§9). Agents depend only on these traits; concrete
//! implementations live in [`crate::gitlab`], [`crate::jira`],
//! [`crate::figma`], [`crate::slack`], and [`crate::monitoring`].

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tracker issue, as returned by [`IssueTracker::create_issue`] and
/// [`IssueTracker::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Vendor-assigned key (e.g. `SHIP-142`).
    pub key: String,
    /// Issue title.
    pub title: String,
    /// Current workflow status.
    pub status: String,
}

/// Issue-tracker capability (Jira-shaped).
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create an issue, returning its assigned key.
    async fn create_issue(
        &self,
        title: &str,
        description: &str,
        labels: &[String],
    ) -> Result<Issue, AdapterError>;

    /// Transition an issue to a new workflow status.
    async fn transition(&self, key: &str, status: &str) -> Result<(), AdapterError>;

    /// Search for issues matching a JQL-like query string.
    async fn search(&self, query: &str) -> Result<Vec<Issue>, AdapterError>;
}

/// A single file to create as part of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// A merge request, as returned by [`VersionControl::create_merge_request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Project-internal iid.
    pub iid: i64,
    /// Web URL for humans.
    pub web_url: String,
}

/// A project member, used by Review Coordination's reviewer scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    /// Vendor user id.
    pub id: i64,
    /// Display or username.
    pub username: String,
    /// Numeric access level (GitLab-style: 40 maintainer, 30 developer, ...).
    pub access_level: i32,
}

/// A CI/CD pipeline, as returned by [`VersionControl::get_pipelines`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Vendor-assigned id.
    pub id: i64,
    /// `running` | `success` | `failed` | ...
    pub status: String,
    /// Git ref the pipeline ran against.
    pub git_ref: String,
}

/// A commit, as returned by [`VersionControl::get_commits`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit SHA.
    pub sha: String,
    /// Commit message, first line or full body.
    pub message: String,
}

/// Version-control capability (GitLab-shaped).
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create a branch from `source_ref`. `Err(AlreadyExists)` is
    /// non-fatal — callers proceed as if creation succeeded.
    async fn create_branch(&self, branch: &str, source_ref: &str) -> Result<(), AdapterError>;

    /// Create or update a file on `branch` with a commit message.
    async fn create_file(
        &self,
        branch: &str,
        file: &FileChange,
        commit_message: &str,
    ) -> Result<(), AdapterError>;

    /// Open a merge request from `source_branch` into `target_branch`.
    async fn create_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
        reviewer_ids: &[i64],
    ) -> Result<MergeRequest, AdapterError>;

    /// Unified diff for a merge request or push.
    async fn get_diff(&self, mr_iid: i64) -> Result<String, AdapterError>;

    /// Post a comment (note) on a merge request.
    async fn add_mr_comment(&self, mr_iid: i64, body: &str) -> Result<(), AdapterError>;

    /// Merge a merge request.
    async fn merge(&self, mr_iid: i64) -> Result<(), AdapterError>;

    /// List project members, for reviewer scoring.
    async fn list_members(&self) -> Result<Vec<ProjectMember>, AdapterError>;

    /// List recent pipelines, optionally filtered by ref.
    async fn get_pipelines(&self, git_ref: Option<&str>) -> Result<Vec<Pipeline>, AdapterError>;

    /// Trigger a new pipeline on `git_ref` with the given variables.
    async fn trigger_pipeline(
        &self,
        git_ref: &str,
        variables: &std::collections::HashMap<String, String>,
    ) -> Result<Pipeline, AdapterError>;

    /// Open a discussion thread on a merge request (used for
    /// critical-vulnerability escalation).
    async fn create_discussion(&self, mr_iid: i64, body: &str) -> Result<(), AdapterError>;

    /// Recent commits on a ref, newest first.
    async fn get_commits(&self, git_ref: &str, limit: u32) -> Result<Vec<Commit>, AdapterError>;
}

/// A design file's metadata, as returned by [`DesignTool::get_file`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignFile {
    /// File key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Last-modified timestamp, vendor format.
    pub last_modified: String,
}

/// A named, typed design component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignComponent {
    /// Component key.
    pub key: String,
    /// Component name.
    pub name: String,
}

/// Design-tool capability (Figma-shaped).
#[async_trait]
pub trait DesignTool: Send + Sync {
    /// Fetch file metadata.
    async fn get_file(&self, file_key: &str) -> Result<DesignFile, AdapterError>;

    /// List a file's components.
    async fn get_components(&self, file_key: &str) -> Result<Vec<DesignComponent>, AdapterError>;
}

/// Chat-service capability (Slack-shaped).
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Post a message to a channel.
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), AdapterError>;
}

/// An unresolved error-tracking issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringIssue {
    /// Vendor issue id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Occurrence count in the queried window.
    pub event_count: u64,
}

/// Error-tracking capability (Sentry-shaped).
#[async_trait]
pub trait MonitoringIssues: Send + Sync {
    /// Unresolved issues first seen within `window_minutes` of now.
    async fn list_recent_unresolved(
        &self,
        window_minutes: u32,
    ) -> Result<Vec<MonitoringIssue>, AdapterError>;
}

/// A monitor, as returned by [`MonitoringMetrics::list_alerting_monitors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Vendor monitor id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `OK` | `Alert` | `Warn` | ...
    pub status: String,
}

/// Metrics/alerting capability (Datadog-shaped).
#[async_trait]
pub trait MonitoringMetrics: Send + Sync {
    /// Monitors currently in an alerting state.
    async fn list_alerting_monitors(&self) -> Result<Vec<Monitor>, AdapterError>;
}
