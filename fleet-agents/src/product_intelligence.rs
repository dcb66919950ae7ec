//! Product Intelligence Agent (§4.5).

use async_trait::async_trait;
use fleet_adapters::traits::IssueTracker;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use std::sync::Arc;

const MAX_GENERATED_ISSUES: usize = 5;

/// On `ticket_created`/`ticket_updated`, asks the LLM to extract
/// requirements and stories, tags complexity, and opens follow-up
/// tracker issues.
pub struct ProductIntelligenceAgent {
    llm: Arc<dyn LlmClient>,
    issue_tracker: Option<Arc<dyn IssueTracker>>,
    kinds: Vec<EventKind>,
}

impl ProductIntelligenceAgent {
    /// `issue_tracker` is `None` when the project has no issue-tracker
    /// credential configured; follow-up issue creation is then skipped.
    pub fn new(llm: Arc<dyn LlmClient>, issue_tracker: Option<Arc<dyn IssueTracker>>) -> Self {
        Self { llm, issue_tracker, kinds: vec![EventKind::TicketCreated, EventKind::TicketUpdated] }
    }

    fn fallback(&self) -> serde_json::Value {
        serde_json::json!({
            "summary": "",
            "stories": [],
            "complexity": "medium",
            "estimated_effort_hours": 0,
            "tags": [],
            "related_topics": [],
        })
    }
}

#[async_trait]
impl Agent for ProductIntelligenceAgent {
    fn name(&self) -> &str {
        "product_intelligence"
    }

    fn description(&self) -> &str {
        "Extracts requirements, complexity, and stories from ticket content"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError> {
        let ticket_key = event.payload.get("ticket_key").and_then(|v| v.as_str()).unwrap_or("TICKET");
        let title = event.payload.get("title").and_then(|v| v.as_str()).unwrap_or_default();
        let description = event.payload.get("description").and_then(|v| v.as_str()).unwrap_or_default();

        let prompt = Prompt {
            system: "You analyze software tickets. Respond with JSON only: \
                     {summary, stories: [string], complexity: low|medium|high, \
                     estimated_effort_hours: number, tags: [string], related_topics: [string]}."
                .to_string(),
            user: format!("Title: {title}\nDescription: {description}"),
            max_tokens: 1024,
            temperature: 0.2,
        };

        let required = ["summary", "stories", "complexity", "estimated_effort_hours", "tags", "related_topics"];
        let mut analysis = call_json(self.llm.as_ref(), prompt, &required, self.fallback()).await;

        let complexity = analysis.get("complexity").and_then(|v| v.as_str()).unwrap_or("medium");
        if !matches!(complexity, "low" | "medium" | "high") {
            analysis["complexity"] = serde_json::json!("medium");
        }
        let effort = analysis.get("estimated_effort_hours").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if effort < 0.0 {
            analysis["estimated_effort_hours"] = serde_json::json!(0);
        }

        let stories = analysis.get("stories").and_then(|v| v.as_array()).cloned().unwrap_or_default();

        ctx.publish_derived(
            event,
            EventKind::RequirementsAnalyzed,
            serde_json::json!({"ticket_key": ticket_key, "analysis": analysis, "stories": stories}),
            self.name(),
        )
        .await;
        ctx.publish_derived(
            event,
            EventKind::ComplexityTagged,
            serde_json::json!({
                "ticket_key": ticket_key,
                "complexity": analysis["complexity"],
                "effort": analysis["estimated_effort_hours"],
                "tags": analysis["tags"],
            }),
            self.name(),
        )
        .await;

        if !stories.is_empty() {
            ctx.publish_derived(
                event,
                EventKind::StoriesExtracted,
                serde_json::json!({"stories": stories}),
                self.name(),
            )
            .await;
        }

        if let Some(tracker) = &self.issue_tracker {
            for story in stories.iter().take(MAX_GENERATED_ISSUES) {
                let story_title = story.as_str().unwrap_or("Untitled story");
                match tracker.create_issue(story_title, description, &["auto-generated".to_string()]).await {
                    Ok(issue) => tracing::debug!(key = %issue.key, "created follow-up story issue"),
                    Err(err) => tracing::warn!(error = %err, "failed to create follow-up story issue"),
                }
            }
        }

        ctx.publish_derived(
            event,
            EventKind::ChatNotification,
            serde_json::json!({"text": format!("Product Intelligence analyzed {title}")}),
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

    struct FixedLlm(&'static str);

    #[async_trait::async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn invalid_complexity_is_replaced_with_medium() {
        let llm = Arc::new(FixedLlm(
            r#"{"summary":"s","stories":[],"complexity":"extreme","estimated_effort_hours":2,"tags":[],"related_topics":[]}"#,
        ));
        let agent = ProductIntelligenceAgent::new(llm, None);
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::TicketCreated, serde_json::json!({"title": "t"}), "jira_webhook", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let history = bus.history(10, Some(EventKind::RequirementsAnalyzed), None).await;
        assert_eq!(history[0].payload["analysis"]["complexity"], "medium");
        let tagged = bus.history(10, Some(EventKind::ComplexityTagged), None).await;
        assert_eq!(tagged[0].payload["complexity"], "medium");
        bus.stop().await;
    }

    #[tokio::test]
    async fn non_empty_stories_emit_stories_extracted() {
        let llm = Arc::new(FixedLlm(
            r#"{"summary":"s","stories":["story a"],"complexity":"low","estimated_effort_hours":1,"tags":[],"related_topics":[]}"#,
        ));
        let agent = ProductIntelligenceAgent::new(llm, None);
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::TicketCreated, serde_json::json!({"title": "t"}), "jira_webhook", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let history = bus.history(10, Some(EventKind::StoriesExtracted), None).await;
        assert_eq!(history.len(), 1);
        bus.stop().await;
    }
}
