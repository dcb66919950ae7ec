//! Test Intelligence Agent (§4.9).

use crate::truncate_comment;
use async_trait::async_trait;
use fleet_adapters::traits::VersionControl;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use std::sync::Arc;

/// Reacts to `pr_opened`/`code_pushed`/`security_scan_complete` by
/// suggesting tests for the diff. `test_report_created` doubles as the
/// logical pass proxy auto-merge readiness waits on (Open Question 2).
pub struct TestIntelligenceAgent {
    llm: Arc<dyn LlmClient>,
    vcs: Option<Arc<dyn VersionControl>>,
    kinds: Vec<EventKind>,
}

impl TestIntelligenceAgent {
    /// `vcs` is required to fetch the diff and post the suggestions
    /// comment; without it the agent still emits a fallback report.
    pub fn new(llm: Arc<dyn LlmClient>, vcs: Option<Arc<dyn VersionControl>>) -> Self {
        Self {
            llm,
            vcs,
            kinds: vec![EventKind::PrOpened, EventKind::CodePushed, EventKind::SecurityScanComplete],
        }
    }

    fn fallback(&self) -> serde_json::Value {
        serde_json::json!({
            "unit_tests": [],
            "integration_tests": [],
            "edge_cases": [],
            "coverage_gaps": [],
            "priority_order": [],
        })
    }
}

#[async_trait]
impl Agent for TestIntelligenceAgent {
    fn name(&self) -> &str {
        "test_intelligence"
    }

    fn description(&self) -> &str {
        "Suggests unit/integration tests and edge cases for a diff"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError> {
        let mr_iid = event.payload.get("mr_iid").and_then(|v| v.as_i64()).unwrap_or(0);

        let diff = match event.payload.get("diff").and_then(|v| v.as_str()) {
            Some(inline) => inline.to_string(),
            None => match &self.vcs {
                Some(vcs) if mr_iid != 0 => match vcs.get_diff(mr_iid).await {
                    Ok(diff) => diff,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to fetch diff for test suggestions");
                        String::new()
                    }
                },
                _ => String::new(),
            },
        };

        if diff.is_empty() {
            tracing::debug!("empty diff, skipping test suggestions");
            return Ok(());
        }

        let prompt = Prompt {
            system: "You suggest tests for a code diff. Respond with JSON only: \
                     {unit_tests: [string], integration_tests: [string], edge_cases: [string], \
                     coverage_gaps: [string], priority_order: [string]}."
                .to_string(),
            user: format!("Diff:\n{diff}"),
            max_tokens: 2048,
            temperature: 0.2,
        };
        let required = ["unit_tests", "integration_tests", "edge_cases", "coverage_gaps", "priority_order"];
        let suggestions = call_json(self.llm.as_ref(), prompt, &required, self.fallback()).await;

        if let Some(vcs) = &self.vcs {
            if mr_iid != 0 {
                let unit = suggestions.get("unit_tests").and_then(|v| v.as_array()).cloned().unwrap_or_default();
                let body = unit.iter().filter_map(|t| t.as_str()).collect::<Vec<_>>().join("\n- ");
                if let Err(err) = vcs.add_mr_comment(mr_iid, &truncate_comment(&body)).await {
                    tracing::warn!(error = %err, "failed to post test suggestions comment");
                }
            }
        }

        ctx.publish_derived(event, EventKind::TestSuggestionsGenerated, suggestions, self.name()).await;
        ctx.publish_derived(event, EventKind::TestReportCreated, serde_json::json!({"mr_iid": mr_iid}), self.name()).await;

        Ok(())
    }
}
