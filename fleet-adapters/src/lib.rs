#![deny(missing_docs)]
//! # fleet-adapters — capability traits and vendor adapters
//!
//! | module | purpose |
//! |---|---|
//! | [`traits`] | `IssueTracker`, `VersionControl`, `DesignTool`, `ChatService`, `MonitoringIssues`, `MonitoringMetrics` |
//! | [`error`] | `AdapterError` |
//! | [`jira`] | Jira Cloud `IssueTracker` |
//! | [`gitlab`] | GitLab REST v4 `VersionControl` |
//! | [`figma`] | Figma REST `DesignTool` plus webhook signature verification |
//! | [`slack`] | Slack Web API `ChatService` |
//! | [`monitoring`] | Sentry `MonitoringIssues`, Datadog `MonitoringMetrics` |
//!
//! Agents hold `Arc<dyn Trait>` fields for whichever capabilities they
//! need; a project with no credential row for a capability simply has
//! no adapter constructed for it, and the agent treats the call as
//! unavailable rather than failing.

pub mod error;
pub mod figma;
pub mod gitlab;
pub mod jira;
pub mod monitoring;
pub mod slack;
pub mod traits;

/// Convenience re-exports of the capability traits and their concrete
/// implementations.
pub mod prelude {
    pub use crate::error::AdapterError;
    pub use crate::figma::{verify_webhook_signature, FigmaDesignTool};
    pub use crate::gitlab::GitlabVersionControl;
    pub use crate::jira::JiraIssueTracker;
    pub use crate::monitoring::{DatadogMonitoringMetrics, SentryMonitoringIssues};
    pub use crate::slack::SlackChatService;
    pub use crate::traits::{
        ChatService, Commit, DesignComponent, DesignFile, DesignTool, FileChange, Issue, IssueTracker,
        MergeRequest, Monitor, MonitoringIssue, MonitoringIssues, MonitoringMetrics, Pipeline, ProjectMember,
        VersionControl,
    };
}
