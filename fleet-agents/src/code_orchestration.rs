//! Code Orchestration Agent (§4.7).

use crate::slug::slugify;
use async_trait::async_trait;
use fleet_adapters::error::AdapterError;
use fleet_adapters::traits::{FileChange, VersionControl};
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use std::sync::Arc;

const SLUG_MAX_LEN: usize = 40;
const MAX_GENERATED_FILES: usize = 10;
const MAX_AUTO_REVIEWERS: usize = 2;

/// Reacts to `requirements_analyzed` and `issue_assigned` by opening a
/// feature branch, scaffolding boilerplate via the LLM, and proposing
/// a merge request.
pub struct CodeOrchestrationAgent {
    llm: Arc<dyn LlmClient>,
    vcs: Option<Arc<dyn VersionControl>>,
    kinds: Vec<EventKind>,
}

impl CodeOrchestrationAgent {
    /// `vcs` is `None` when the project has no version-control
    /// credential configured — branch/MR steps are then skipped but
    /// `branch_created`/`pr_template_created` are still published per
    /// §4.7's "regardless of outcome" rule.
    pub fn new(llm: Arc<dyn LlmClient>, vcs: Option<Arc<dyn VersionControl>>) -> Self {
        Self {
            llm,
            vcs,
            kinds: vec![EventKind::RequirementsAnalyzed, EventKind::IssueAssigned, EventKind::ImplNotesGenerated],
        }
    }

    fn boilerplate_fallback(&self) -> serde_json::Value {
        serde_json::json!({"files": [], "pr_description": "", "suggested_reviewers_criteria": []})
    }

    async fn ensure_branch(&self, branch: &str, source_ref: &str) {
        let Some(vcs) = &self.vcs else { return };
        match vcs.create_branch(branch, source_ref).await {
            Ok(()) => {}
            Err(AdapterError::AlreadyExists(_)) => {
                tracing::debug!(branch, "branch already exists, proceeding");
            }
            Err(err) => tracing::warn!(branch, error = %err, "failed to create branch"),
        }
    }

    async fn scaffold_files(&self, branch: &str, files: &[serde_json::Value]) {
        let Some(vcs) = &self.vcs else { return };
        for file in files.iter().take(MAX_GENERATED_FILES) {
            let (Some(path), Some(content)) =
                (file.get("path").and_then(|v| v.as_str()), file.get("content").and_then(|v| v.as_str()))
            else {
                continue;
            };
            let change = FileChange { path: path.to_string(), content: content.to_string() };
            if let Err(err) = vcs.create_file(branch, &change, &format!("Add {path}")).await {
                tracing::warn!(path, error = %err, "failed to create boilerplate file");
            }
        }
    }

    async fn propose_merge_request(&self, branch: &str, title: &str, description: &str) -> i64 {
        let Some(vcs) = &self.vcs else { return 0 };
        let reviewer_ids: Vec<i64> = match vcs.list_members().await {
            Ok(members) => members.iter().take(MAX_AUTO_REVIEWERS).map(|m| m.id).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to list members for reviewer auto-assignment");
                Vec::new()
            }
        };
        match vcs.create_merge_request(branch, "main", title, description, &reviewer_ids).await {
            Ok(mr) => mr.iid,
            Err(err) => {
                tracing::warn!(error = %err, "failed to create merge request");
                0
            }
        }
    }

    async fn orchestrate(&self, event: &Event, ctx: &AgentContext, key: &str, title: &str, analysis: Option<&serde_json::Value>) -> Result<(), AgentError> {
        let branch = format!("feature/{key}-{}", slugify(title, SLUG_MAX_LEN));
        self.ensure_branch(&branch, "main").await;
        ctx.publish_derived(event, EventKind::BranchCreated, serde_json::json!({"branch": branch}), self.name()).await;

        if analysis.is_some() {
            let prompt = Prompt {
                system: "You scaffold boilerplate code for a feature branch. Respond with JSON \
                         only: {files: [{path, content}], pr_description: string, \
                         suggested_reviewers_criteria: [string]}."
                    .to_string(),
                user: format!("Ticket: {title}\nAnalysis: {analysis:?}"),
                max_tokens: 2048,
                temperature: 0.2,
            };
            let required = ["files", "pr_description", "suggested_reviewers_criteria"];
            let boilerplate = call_json(self.llm.as_ref(), prompt, &required, self.boilerplate_fallback()).await;
            let files = boilerplate.get("files").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            self.scaffold_files(&branch, &files).await;
            ctx.publish_derived(event, EventKind::BoilerplateGenerated, boilerplate, self.name()).await;
        }

        let mr_iid = self.propose_merge_request(&branch, title, "Automated branch for tracked work").await;
        ctx.publish_derived(
            event,
            EventKind::PrTemplateCreated,
            serde_json::json!({"branch": branch, "mr_iid": mr_iid}),
            self.name(),
        )
        .await;

        Ok(())
    }
}

#[async_trait]
impl Agent for CodeOrchestrationAgent {
    fn name(&self) -> &str {
        "code_orchestration"
    }

    fn description(&self) -> &str {
        "Opens feature branches, scaffolds boilerplate, and proposes merge requests"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError> {
        match event.kind {
            EventKind::RequirementsAnalyzed => {
                let key = event.payload.get("ticket_key").and_then(|v| v.as_str()).unwrap_or("TICKET");
                let analysis = event.payload.get("analysis");
                let title = analysis.and_then(|a| a.get("summary")).and_then(|v| v.as_str()).unwrap_or("Untitled");
                self.orchestrate(event, ctx, key, title, analysis).await
            }
            EventKind::IssueAssigned => {
                let key = event.payload.get("issue_id").and_then(|v| v.as_str()).unwrap_or("ISSUE");
                let title = event.payload.get("title").and_then(|v| v.as_str()).unwrap_or("Untitled");
                let analysis = event.payload.get("analysis");
                self.orchestrate(event, ctx, key, title, analysis).await
            }
            EventKind::ImplNotesGenerated => {
                // Re-run against the existing branch; `ensure_branch` already
                // swallows `AlreadyExists` as non-fatal.
                let key = event.payload.get("file_key").and_then(|v| v.as_str()).unwrap_or("DESIGN");
                let title = event
                    .payload
                    .get("notes")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("Design implementation");
                self.orchestrate(event, ctx, key, title, None).await
            }
            _ => Ok(()),
        }
    }
}
