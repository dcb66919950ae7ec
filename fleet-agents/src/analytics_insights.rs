//! Analytics & Insights Agent (§4.12).

use async_trait::async_trait;
use fleet_adapters::traits::MonitoringMetrics;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::{AgentError, SchedulerError};
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use fleet_stores::agent_config::AgentConfigStore;
use std::sync::Arc;

/// On `metrics_collected` or a scheduler tick, asks the LLM for
/// bottlenecks/predictions/recommendations and publishes a report.
pub struct AnalyticsInsightsAgent {
    llm: Arc<dyn LlmClient>,
    monitoring_metrics: Option<Arc<dyn MonitoringMetrics>>,
    agent_config_store: Arc<dyn AgentConfigStore>,
    bus: fleet_core::bus::EventBus,
    /// Fallback project roster used for the scheduled fan-out when no
    /// `AgentConfig` row exists for this agent yet. There is no global
    /// project registry in this system; the composition root seeds this
    /// from whatever project list it already knows about.
    default_projects: Vec<Option<i64>>,
}

impl AnalyticsInsightsAgent {
    /// `bus` is needed directly (not just an [`AgentContext`]) because
    /// the scheduled tick has no parent event to derive from.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        monitoring_metrics: Option<Arc<dyn MonitoringMetrics>>,
        agent_config_store: Arc<dyn AgentConfigStore>,
        bus: fleet_core::bus::EventBus,
        default_projects: Vec<Option<i64>>,
    ) -> Self {
        Self { llm, monitoring_metrics, agent_config_store, bus, default_projects }
    }

    fn fallback(&self, task_counts: &serde_json::Value) -> serde_json::Value {
        let completion_pct = task_counts
            .get("done")
            .and_then(|v| v.as_f64())
            .zip(task_counts.get("total").and_then(|v| v.as_f64()))
            .filter(|(_, total)| *total > 0.0)
            .map(|(done, total)| (done / total * 100.0).round())
            .unwrap_or(0.0);
        serde_json::json!({
            "bottlenecks": [],
            "predictions": {"sprint_completion_pct": completion_pct, "velocity_trend": "stable"},
            "recommendations": [],
            "executive_summary": "",
        })
    }

    fn sanitize(mut result: serde_json::Value, fallback: &serde_json::Value) -> serde_json::Value {
        let pct_valid = result
            .get("predictions")
            .and_then(|p| p.get("sprint_completion_pct"))
            .and_then(|v| v.as_f64())
            .is_some_and(|v| (0.0..=100.0).contains(&v));
        let trend_valid = result
            .get("predictions")
            .and_then(|p| p.get("velocity_trend"))
            .and_then(|v| v.as_str())
            .is_some_and(|t| matches!(t, "increasing" | "stable" | "decreasing"));

        if !pct_valid || !trend_valid {
            result["predictions"] = fallback["predictions"].clone();
        }
        result
    }

    async fn analyze_for_project(&self, project: Option<i64>, task_counts: serde_json::Value) -> Result<(), AgentError> {
        let alerting = match &self.monitoring_metrics {
            Some(metrics) => metrics.list_alerting_monitors().await.unwrap_or_default(),
            None => Vec::new(),
        };

        let prompt = Prompt {
            system: "You analyze project delivery metrics. Respond with JSON only: \
                     {bottlenecks: [string], predictions: {sprint_completion_pct: number, \
                     velocity_trend: increasing|stable|decreasing}, recommendations: [string], \
                     executive_summary: string}."
                .to_string(),
            user: format!("Task distribution: {task_counts}\nAlerting monitors: {alerting:?}"),
            max_tokens: 1536,
            temperature: 0.3,
        };
        let required = ["bottlenecks", "predictions", "recommendations", "executive_summary"];
        let fallback = self.fallback(&task_counts);
        let result = call_json(self.llm.as_ref(), prompt, &required, fallback.clone()).await;
        let result = Self::sanitize(result, &fallback);

        let source = Event::new(EventKind::MetricsCollected, task_counts, self.name(), project);
        if result.get("bottlenecks").and_then(|v| v.as_array()).is_some_and(|a| !a.is_empty()) {
            let event = Event::derive(&source, EventKind::BottleneckDetected, result.clone(), self.name());
            let _ = self.bus.publish(event).await;
        }
        let event = Event::derive(&source, EventKind::ReportGenerated, result.clone(), self.name());
        let _ = self.bus.publish(event).await;
        let event = Event::derive(
            &source,
            EventKind::ChatNotification,
            serde_json::json!({"text": result["executive_summary"]}),
            self.name(),
        );
        let _ = self.bus.publish(event).await;

        self.agent_config_store.record_run(project, self.name(), now_millis()).await;
        Ok(())
    }

    /// Invoked by the [`fleet_core::scheduler::Scheduler`] job, not
    /// through the bus — there is no parent event to derive from.
    pub async fn run_scheduled_tick(&self) -> Result<(), SchedulerError> {
        let mut projects = self.agent_config_store.projects_for_agent(self.name()).await;
        if projects.is_empty() {
            projects = self.default_projects.clone();
        }
        for project in projects {
            if let Err(err) = self.analyze_for_project(project, serde_json::json!({})).await {
                tracing::warn!(?project, error = %err, "scheduled analytics run failed for project");
            }
        }
        Ok(())
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[async_trait]
impl Agent for AnalyticsInsightsAgent {
    fn name(&self) -> &str {
        "analytics_insights"
    }

    fn description(&self) -> &str {
        "Analyzes delivery metrics and publishes bottleneck/report events"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        const KINDS: [EventKind; 1] = [EventKind::MetricsCollected];
        &KINDS
    }

    async fn handle(&self, event: &Event, _ctx: &AgentContext) -> Result<(), AgentError> {
        self.analyze_for_project(event.project_scope, event.payload.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::bus::EventBus;
    use fleet_llm::error::LlmError;
    use fleet_stores::agent_config::MemoryAgentConfigStore;

    struct FixedLlm(&'static str);

    #[async_trait::async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn out_of_range_completion_pct_falls_back_to_raw_counts() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let llm = FixedLlm(
            r#"{"bottlenecks":[],"predictions":{"sprint_completion_pct":500,"velocity_trend":"stable"},"recommendations":[],"executive_summary":"s"}"#,
        );
        let agent = AnalyticsInsightsAgent::new(
            Arc::new(llm),
            None,
            Arc::new(MemoryAgentConfigStore::new()),
            bus.clone(),
            vec![Some(1)],
        );
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::MetricsCollected, serde_json::json!({"done": 3, "total": 4}), "scheduler", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let reports = bus.history(10, Some(EventKind::ReportGenerated), None).await;
        assert_eq!(reports[0].payload["predictions"]["sprint_completion_pct"], 75.0);
        bus.stop().await;
    }

    #[tokio::test]
    async fn scheduled_tick_falls_back_to_default_projects_when_unconfigured() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let llm = FixedLlm(r#"{"bottlenecks":["x"],"predictions":{"sprint_completion_pct":10,"velocity_trend":"stable"},"recommendations":[],"executive_summary":"s"}"#);
        let agent = AnalyticsInsightsAgent::new(
            Arc::new(llm),
            None,
            Arc::new(MemoryAgentConfigStore::new()),
            bus.clone(),
            vec![Some(1), Some(2)],
        );
        agent.run_scheduled_tick().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(bus.history(10, Some(EventKind::BottleneckDetected), None).await.len(), 2);
        bus.stop().await;
    }
}
