//! Design Sync Agent (§4.6).

use async_trait::async_trait;
use fleet_adapters::traits::{DesignTool, Issue, IssueTracker};
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use std::sync::Arc;

/// On `design_changed`, loads the design file plus related open
/// tickets, asks the LLM for an implementation plan, and files one
/// follow-up tracker issue.
pub struct DesignSyncAgent {
    llm: Arc<dyn LlmClient>,
    design_tool: Option<Arc<dyn DesignTool>>,
    issue_tracker: Option<Arc<dyn IssueTracker>>,
    kinds: Vec<EventKind>,
}

impl DesignSyncAgent {
    /// Both capabilities are optional — a project missing either
    /// credential still gets an LLM-only best-effort pass.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        design_tool: Option<Arc<dyn DesignTool>>,
        issue_tracker: Option<Arc<dyn IssueTracker>>,
    ) -> Self {
        Self { llm, design_tool, issue_tracker, kinds: vec![EventKind::DesignChanged] }
    }

    fn fallback(&self) -> serde_json::Value {
        serde_json::json!({
            "component_specs": [],
            "implementation_steps": [],
            "design_ticket_alignment": "unknown",
            "notes": "",
        })
    }

    async fn related_open_tickets(&self, query: &str) -> Vec<Issue> {
        let Some(tracker) = &self.issue_tracker else { return Vec::new() };
        match tracker.search(&format!("status in (todo, in_progress) AND text ~ \"{query}\"")).await {
            Ok(issues) => issues,
            Err(err) => {
                tracing::warn!(error = %err, "failed to look up related open tickets");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Agent for DesignSyncAgent {
    fn name(&self) -> &str {
        "design_sync"
    }

    fn description(&self) -> &str {
        "Compares design changes against related tickets and plans implementation"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError> {
        let file_key = event.payload.get("file_key").and_then(|v| v.as_str()).unwrap_or_default();

        let file_name = if let Some(design_tool) = &self.design_tool {
            match design_tool.get_file(file_key).await {
                Ok(file) => file.name,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to load design file metadata");
                    file_key.to_string()
                }
            }
        } else {
            file_key.to_string()
        };

        let related = self.related_open_tickets(&file_name).await;
        let related_summary: Vec<String> = related.iter().map(|i| format!("{}: {}", i.key, i.title)).collect();

        let prompt = Prompt {
            system: "You compare a design file against related open tickets and plan the \
                     implementation. Respond with JSON only: {component_specs: [string], \
                     implementation_steps: [string], design_ticket_alignment: string, notes: string}."
                .to_string(),
            user: format!("Design file: {file_name}\nRelated tickets: {related_summary:?}"),
            max_tokens: 1024,
            temperature: 0.2,
        };
        let required = ["component_specs", "implementation_steps", "design_ticket_alignment", "notes"];
        let analysis = call_json(self.llm.as_ref(), prompt, &required, self.fallback()).await;

        ctx.publish_derived(event, EventKind::DesignCompared, analysis.clone(), self.name()).await;

        let mut impl_notes = analysis.clone();
        if let serde_json::Value::Object(map) = &mut impl_notes {
            map.insert("file_key".to_string(), serde_json::json!(file_key));
        }
        ctx.publish_derived(event, EventKind::ImplNotesGenerated, impl_notes, self.name()).await;

        if let Some(tracker) = &self.issue_tracker {
            let steps = analysis.get("implementation_steps").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            let description = steps.iter().filter_map(|s| s.as_str()).collect::<Vec<_>>().join("\n- ");
            match tracker
                .create_issue(&format!("Design Implementation: {file_key}"), &description, &["auto-generated".to_string()])
                .await
            {
                Ok(issue) => tracing::debug!(key = %issue.key, "created design follow-up issue"),
                Err(err) => tracing::warn!(error = %err, "failed to create design follow-up issue"),
            }
        }

        ctx.publish_derived(
            event,
            EventKind::ChatNotification,
            serde_json::json!({"text": format!("Design Sync compared {file_name}")}),
            self.name(),
        )
        .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::bus::EventBus;
    use fleet_llm::error::LlmError;

    struct FixedLlm;

    #[async_trait::async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
            Ok(r#"{"component_specs":["Button"],"implementation_steps":["Add variant"],"design_ticket_alignment":"aligned","notes":""}"#.to_string())
        }
    }

    #[tokio::test]
    async fn publishes_design_compared_and_impl_notes() {
        let agent = DesignSyncAgent::new(Arc::new(FixedLlm), None, None);
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::DesignChanged, serde_json::json!({"file_key": "abc"}), "figma_webhook", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(bus.history(10, Some(EventKind::DesignCompared), None).await.len(), 1);
        assert_eq!(bus.history(10, Some(EventKind::ImplNotesGenerated), None).await.len(), 1);
        bus.stop().await;
    }
}
