//! The [`Event`] value type and the closed [`EventKind`] enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for an [`Event`], generated at construction.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Generate a new random event id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of everything the fleet can publish or react to.
///
/// Wire names (the `rename_all` snake_case form) are the contract with
/// webhook ingress and the operator HTTP surface — do not reorder or
/// rename variants without updating both.
#[allow(missing_docs)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TicketCreated,
    TicketUpdated,
    CodePushed,
    PrOpened,
    PrReadyForReview,
    PrApproved,
    MergeToMain,
    IssueAssigned,
    PipelineStarted,
    PipelineCompleted,
    PipelineFailed,
    DesignChanged,
    RequirementsAnalyzed,
    ComplexityTagged,
    StoriesExtracted,
    DesignCompared,
    ImplNotesGenerated,
    BranchCreated,
    BoilerplateGenerated,
    PrTemplateCreated,
    SecurityScanComplete,
    VulnerabilityFound,
    MergeBlocked,
    ComplianceReportGenerated,
    TestSuggestionsGenerated,
    TestReportCreated,
    CoverageReport,
    ReviewersAssigned,
    ReviewReminderSent,
    ReviewSlaBreached,
    PrAutoMerged,
    DeployStarted,
    DeployComplete,
    DeployFailed,
    RollbackTriggered,
    ReleaseNotesGenerated,
    MetricsCollected,
    ReportGenerated,
    BottleneckDetected,
    ChatNotification,
    AgentError,
}

impl EventKind {
    /// The wire name used on the webhook surface and in audit records.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::TicketCreated => "ticket_created",
            EventKind::TicketUpdated => "ticket_updated",
            EventKind::CodePushed => "code_pushed",
            EventKind::PrOpened => "pr_opened",
            EventKind::PrReadyForReview => "pr_ready_for_review",
            EventKind::PrApproved => "pr_approved",
            EventKind::MergeToMain => "merge_to_main",
            EventKind::IssueAssigned => "issue_assigned",
            EventKind::PipelineStarted => "pipeline_started",
            EventKind::PipelineCompleted => "pipeline_completed",
            EventKind::PipelineFailed => "pipeline_failed",
            EventKind::DesignChanged => "design_changed",
            EventKind::RequirementsAnalyzed => "requirements_analyzed",
            EventKind::ComplexityTagged => "complexity_tagged",
            EventKind::StoriesExtracted => "stories_extracted",
            EventKind::DesignCompared => "design_compared",
            EventKind::ImplNotesGenerated => "impl_notes_generated",
            EventKind::BranchCreated => "branch_created",
            EventKind::BoilerplateGenerated => "boilerplate_generated",
            EventKind::PrTemplateCreated => "pr_template_created",
            EventKind::SecurityScanComplete => "security_scan_complete",
            EventKind::VulnerabilityFound => "vulnerability_found",
            EventKind::MergeBlocked => "merge_blocked",
            EventKind::ComplianceReportGenerated => "compliance_report_generated",
            EventKind::TestSuggestionsGenerated => "test_suggestions_generated",
            EventKind::TestReportCreated => "test_report_created",
            EventKind::CoverageReport => "coverage_report",
            EventKind::ReviewersAssigned => "reviewers_assigned",
            EventKind::ReviewReminderSent => "review_reminder_sent",
            EventKind::ReviewSlaBreached => "review_sla_breached",
            EventKind::PrAutoMerged => "pr_auto_merged",
            EventKind::DeployStarted => "deploy_started",
            EventKind::DeployComplete => "deploy_complete",
            EventKind::DeployFailed => "deploy_failed",
            EventKind::RollbackTriggered => "rollback_triggered",
            EventKind::ReleaseNotesGenerated => "release_notes_generated",
            EventKind::MetricsCollected => "metrics_collected",
            EventKind::ReportGenerated => "report_generated",
            EventKind::BottleneckDetected => "bottleneck_detected",
            EventKind::ChatNotification => "chat_notification",
            EventKind::AgentError => "agent_error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// An immutable record describing what happened.
///
/// `kind` never mutates after construction; `payload` is read-only from
/// the consumer's perspective (agents clone what they need out of it).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier, generated at construction.
    pub id: EventId,
    /// The event's discriminator.
    pub kind: EventKind,
    /// Semi-structured payload; shape is determined by `kind`.
    pub payload: serde_json::Value,
    /// Free-form origin label: an agent name, `"*_webhook"`, or
    /// `"manual_trigger"`.
    pub source: String,
    /// Project the event belongs to; `None` means fleet-wide.
    pub project_scope: Option<i64>,
    /// Id threading a causal chain of events. See [`Event::derive`].
    pub correlation_id: Option<EventId>,
    /// Wall-clock milliseconds since the Unix epoch at construction.
    pub timestamp: u64,
}

impl Event {
    /// Construct a new top-level event (no causal parent).
    pub fn new(
        kind: EventKind,
        payload: serde_json::Value,
        source: impl Into<String>,
        project_scope: Option<i64>,
    ) -> Self {
        Self {
            id: EventId::new(),
            kind,
            payload,
            source: source.into(),
            project_scope,
            correlation_id: None,
            timestamp: now_millis(),
        }
    }

    /// Construct an event published from within a handler of `parent`.
    ///
    /// The correlation id is copied from `parent` (or `parent.id` if
    /// `parent` had none set) — see §3/§8 invariant 7.
    pub fn derive(
        parent: &Event,
        kind: EventKind,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            kind,
            payload,
            source: source.into(),
            project_scope: parent.project_scope,
            correlation_id: Some(parent.correlation_id.unwrap_or(parent.id)),
            timestamp: now_millis(),
        }
    }

    /// The correlation id to use when threading a causal chain from this
    /// event: its own correlation id if set, else its own id.
    pub fn causal_id(&self) -> EventId {
        self.correlation_id.unwrap_or(self.id)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
