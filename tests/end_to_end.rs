//! End-to-end scenarios wiring several agents onto one bus/registry,
//! the way the composition root does, without any real adapter I/O.

use async_trait::async_trait;
use fleet_adapters::error::AdapterError;
use fleet_adapters::traits::{Commit, FileChange, MergeRequest, Pipeline, ProjectMember, VersionControl};
use fleet_agents::prelude::*;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::bus::EventBus;
use fleet_core::error::BusError;
use fleet_core::event::{Event, EventKind};
use fleet_core::readiness::MrReadinessTracker;
use fleet_core::registry::AgentRegistry;
use fleet_core::scheduler::Scheduler;
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::error::LlmError;
use fleet_stores::agent_config::MemoryAgentConfigStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct FixedLlm(&'static str);

#[async_trait]
impl LlmClient for FixedLlm {
    async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

/// A [`VersionControl`] fake whose diff and merge outcomes are
/// configurable per scenario.
struct FakeVcs {
    diff: String,
    merge_ok: bool,
}

impl FakeVcs {
    fn clean() -> Self {
        Self { diff: "+ fn add(a: i32, b: i32) -> i32 { a + b }".to_string(), merge_ok: true }
    }

    fn critical_vuln() -> Self {
        Self { diff: "+ std::process::Command::new(user_input).spawn()".to_string(), merge_ok: true }
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn create_branch(&self, _branch: &str, _source_ref: &str) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn create_file(&self, _branch: &str, _file: &FileChange, _commit_message: &str) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn create_merge_request(
        &self,
        _source_branch: &str,
        _target_branch: &str,
        _title: &str,
        _description: &str,
        _reviewer_ids: &[i64],
    ) -> Result<MergeRequest, AdapterError> {
        Ok(MergeRequest { iid: 42, web_url: "https://example.invalid/mr/42".to_string() })
    }
    async fn get_diff(&self, _mr_iid: i64) -> Result<String, AdapterError> {
        Ok(self.diff.clone())
    }
    async fn add_mr_comment(&self, _mr_iid: i64, _body: &str) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn merge(&self, _mr_iid: i64) -> Result<(), AdapterError> {
        if self.merge_ok {
            Ok(())
        } else {
            Err(AdapterError::Transient("merge rejected".to_string()))
        }
    }
    async fn list_members(&self) -> Result<Vec<ProjectMember>, AdapterError> {
        Ok(vec![ProjectMember { id: 1, username: "alice".to_string(), access_level: 40 }])
    }
    async fn get_pipelines(&self, git_ref: Option<&str>) -> Result<Vec<Pipeline>, AdapterError> {
        Ok(vec![Pipeline { id: 9, status: "success".to_string(), git_ref: git_ref.unwrap_or("main").to_string() }])
    }
    async fn trigger_pipeline(&self, git_ref: &str, _variables: &HashMap<String, String>) -> Result<Pipeline, AdapterError> {
        Ok(Pipeline { id: 10, status: "running".to_string(), git_ref: git_ref.to_string() })
    }
    async fn create_discussion(&self, _mr_iid: i64, _body: &str) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn get_commits(&self, _git_ref: &str, _limit: u32) -> Result<Vec<Commit>, AdapterError> {
        Ok(vec![Commit { sha: "abc123".to_string(), message: "Add login flow".to_string() }])
    }
}

const REQUIREMENTS_RESPONSE: &str =
    r#"{"summary":"s","stories":["Add login"],"complexity":"low","estimated_effort_hours":2,"tags":[],"related_topics":[]}"#;
const BOILERPLATE_RESPONSE: &str = r#"{"files":[],"pr_description":"d","suggested_reviewers_criteria":[]}"#;
const ASSESSMENT_ELIGIBLE: &str =
    r#"{"complexity":"low","risk_areas":[],"recommended_expertise":[],"estimated_review_minutes":10,"summary":"ok","auto_merge_eligible":true}"#;
const SECURITY_CRITICAL: &str =
    r#"{"vulnerabilities":[{"severity":"critical","description":"command injection"}],"overall_risk":"critical","passed":false,"summary":"blocked"}"#;
const RELEASE_NOTES: &str = r#"{"features":["Add login flow"],"summary":"Ships login"}"#;

/// Ticket creation flows through Product Intelligence into Code
/// Orchestration, preserving one correlation id end to end.
#[tokio::test]
async fn ticket_to_pr_chain_shares_one_correlation_id() {
    let bus = EventBus::new(50, 8);
    let registry = AgentRegistry::new(bus.clone());

    let product = ProductIntelligenceAgent::new(Arc::new(FixedLlm(REQUIREMENTS_RESPONSE)), None);
    let code = CodeOrchestrationAgent::new(Arc::new(FixedLlm(BOILERPLATE_RESPONSE)), Some(Arc::new(FakeVcs::clean())));
    registry.register(Arc::new(product)).await;
    registry.register(Arc::new(code)).await;
    registry.start_all().await;

    let ticket = Event::new(
        EventKind::TicketCreated,
        serde_json::json!({"ticket_key": "SHIP-9", "title": "Add login", "description": "Users need to log in"}),
        "jira_webhook",
        Some(1),
    );
    let ticket_id = ticket.id;
    registry.bus().publish(ticket).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let requirements = bus.history(10, Some(EventKind::RequirementsAnalyzed), Some(1)).await;
    assert_eq!(requirements.len(), 1);
    assert_eq!(requirements[0].correlation_id, Some(ticket_id));

    let branches = bus.history(10, Some(EventKind::BranchCreated), Some(1)).await;
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].correlation_id, Some(ticket_id));

    let templates = bus.history(10, Some(EventKind::PrTemplateCreated), Some(1)).await;
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].correlation_id, Some(ticket_id));
    assert_eq!(templates[0].payload["mr_iid"], 42);

    registry.stop_all().await;
}

/// Security approval plus a passing test report together clear a merge
/// request for auto-merge exactly once.
#[tokio::test]
async fn auto_merge_happy_path_merges_exactly_once() {
    let bus = EventBus::new(50, 8);
    let readiness = MrReadinessTracker::new();
    let agent = ReviewCoordinationAgent::new(
        Arc::new(FixedLlm(ASSESSMENT_ELIGIBLE)),
        Some(Arc::new(FakeVcs::clean())),
        readiness,
        Arc::new(MemoryAgentConfigStore::new()),
        true,
    );
    let ctx = AgentContext::new(bus.clone());
    bus.start().await;

    let opened = Event::new(EventKind::PrOpened, serde_json::json!({"mr_iid": 42, "description": "login"}), "gitlab_webhook", Some(1));
    agent.handle(&opened, &ctx).await.unwrap();

    let security = Event::new(EventKind::SecurityScanComplete, serde_json::json!({"mr_iid": 42, "passed": true}), "security_compliance", Some(1));
    agent.handle(&security, &ctx).await.unwrap();

    let tests = Event::new(EventKind::TestReportCreated, serde_json::json!({"mr_iid": 42}), "test_intelligence", Some(1));
    agent.handle(&tests, &ctx).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let merges = bus.history(10, Some(EventKind::PrAutoMerged), Some(1)).await;
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].payload["mr_iid"], 42);

    bus.stop().await;
}

/// A critical vulnerability flips `security_passed` to false, blocking
/// auto-merge even once tests pass.
#[tokio::test]
async fn security_finding_blocks_merge_despite_passing_tests() {
    let bus = EventBus::new(50, 8);
    bus.start().await;
    let vcs: Arc<dyn VersionControl> = Arc::new(FakeVcs::critical_vuln());

    let security = SecurityComplianceAgent::new(Arc::new(FixedLlm(SECURITY_CRITICAL)), Some(vcs.clone()));
    let ctx = AgentContext::new(bus.clone());
    let pr_opened = Event::new(EventKind::PrOpened, serde_json::json!({"mr_iid": 7}), "gitlab_webhook", Some(1));
    security.handle(&pr_opened, &ctx).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let blocked = bus.history(10, Some(EventKind::MergeBlocked), Some(1)).await;
    assert_eq!(blocked.len(), 1);
    let scan = bus.history(10, Some(EventKind::SecurityScanComplete), Some(1)).await;
    assert_eq!(scan[0].payload["passed"], false);

    let readiness = MrReadinessTracker::new();
    let review = ReviewCoordinationAgent::new(
        Arc::new(FixedLlm(ASSESSMENT_ELIGIBLE)),
        Some(vcs),
        readiness.clone(),
        Arc::new(MemoryAgentConfigStore::new()),
        true,
    );
    review.handle(&pr_opened, &ctx).await.unwrap();
    review.handle(&scan[0], &ctx).await.unwrap();
    review.handle(&Event::new(EventKind::TestReportCreated, serde_json::json!({"mr_iid": 7}), "test_intelligence", Some(1)), &ctx)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.history(10, Some(EventKind::PrAutoMerged), Some(1)).await.len(), 0);
    let record = readiness.entry(Some(1), 7).await;
    assert!(!record.lock().await.security_passed);

    bus.stop().await;
}

/// No monitoring configured defaults to unhealthy (Open Question 1's
/// conservative default), triggering a rollback after a merge to main.
#[tokio::test]
async fn deploy_with_no_monitoring_rolls_back() {
    let bus = EventBus::new(50, 8);
    bus.start().await;
    let ctx = AgentContext::new(bus.clone());
    let vcs = Arc::new(FakeVcs::clean());
    let agent = DeploymentOrchestratorAgent::new(Arc::new(FixedLlm(RELEASE_NOTES)), Some(vcs), None, None, true);

    let merge = Event::new(EventKind::MergeToMain, serde_json::json!({}), "gitlab_webhook", Some(1));
    let merge_id = merge.id;
    agent.handle(&merge, &ctx).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.history(10, Some(EventKind::DeployComplete), Some(1)).await.len(), 0);
    let rollbacks = bus.history(10, Some(EventKind::RollbackTriggered), Some(1)).await;
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].correlation_id, Some(merge_id));
    assert_eq!(rollbacks[0].payload["pipeline_id"], 9);

    bus.stop().await;
}

/// The analytics scheduler job fires on its configured interval and
/// stops firing once the scheduler is stopped.
#[tokio::test]
async fn scheduled_analytics_job_fires_on_interval_then_stops() {
    let bus = EventBus::new(50, 8);
    bus.start().await;
    let agent = Arc::new(AnalyticsInsightsAgent::new(
        Arc::new(FixedLlm(
            r#"{"bottlenecks":[],"predictions":{"sprint_completion_pct":40,"velocity_trend":"stable"},"recommendations":[],"executive_summary":"s"}"#,
        )),
        None,
        Arc::new(MemoryAgentConfigStore::new()),
        bus.clone(),
        vec![Some(1)],
    ));

    let scheduler = Scheduler::new(Duration::from_secs(1));
    let job_agent = agent.clone();
    scheduler
        .add_job("analytics_insights", Duration::from_secs(2), move || {
            let job_agent = job_agent.clone();
            async move { job_agent.run_scheduled_tick().await }
        })
        .await
        .unwrap();
    scheduler.start().await;

    // Ticks fire roughly every second; the 2s job interval is due on
    // the first tick and every other one after. A 4.5s window covers
    // four ticks (1s, 2s, 3s, 4s) and two due checks (1s, 3s).
    tokio::time::sleep(Duration::from_millis(4500)).await;
    scheduler.stop().await;

    let reports = bus.history(20, Some(EventKind::ReportGenerated), Some(1)).await;
    assert!((1..=3).contains(&reports.len()), "expected 1-3 scheduled runs, got {}", reports.len());

    let count_after_stop = reports.len();
    tokio::time::sleep(Duration::from_millis(2200)).await;
    let reports_later = bus.history(20, Some(EventKind::ReportGenerated), Some(1)).await;
    assert_eq!(reports_later.len(), count_after_stop, "scheduler must not fire after stop");

    bus.stop().await;
}

/// Publishing after the bus has stopped fails cleanly instead of
/// queuing silently or panicking, and earlier history is preserved.
#[tokio::test]
async fn publish_after_registry_stop_fails_and_preserves_history() {
    let bus = EventBus::new(50, 8);
    let registry = AgentRegistry::new(bus.clone());
    registry.start_all().await;

    let before = Event::new(EventKind::TicketCreated, serde_json::json!({"title": "t"}), "jira_webhook", Some(1));
    registry.bus().publish(before).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    registry.stop_all().await;

    let after = Event::new(EventKind::TicketCreated, serde_json::json!({"title": "t2"}), "jira_webhook", Some(1));
    let result = registry.bus().publish(after).await;
    assert!(matches!(result, Err(BusError::Stopped)));

    assert_eq!(registry.bus().history(10, Some(EventKind::TicketCreated), Some(1)).await.len(), 1);
}
