//! Composition root: reads configuration, builds the bus, registry,
//! scheduler, stores, adapters, LLM client, and all nine agents, then
//! serves the webhook/operator HTTP surface.

use fleet_adapters::figma::FigmaDesignTool;
use fleet_adapters::gitlab::GitlabVersionControl;
use fleet_adapters::jira::JiraIssueTracker;
use fleet_adapters::monitoring::{DatadogMonitoringMetrics, SentryMonitoringIssues};
use fleet_adapters::slack::SlackChatService;
use fleet_adapters::traits::{ChatService, DesignTool, IssueTracker, MonitoringIssues, MonitoringMetrics, VersionControl};
use fleet_agents::prelude::*;
use fleet_core::bus::EventBus;
use fleet_core::config::FleetConfig;
use fleet_core::readiness::MrReadinessTracker;
use fleet_core::registry::AgentRegistry;
use fleet_core::scheduler::Scheduler;
use fleet_core::audit::AuditStore;
use fleet_llm::client::{AnthropicLlmClient, LlmClient};
use fleet_stores::agent_config::MemoryAgentConfigStore;
use fleet_stores::audit::MemoryAuditStore;
use fleet_stores::credentials::MemoryCredentialStore;
use fleet_webhook::state::AppState;
use std::env;
use std::sync::Arc;
use std::time::Duration;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Project-less (environment-wide) capability instances, built from
/// env vars when present. A production multi-tenant deployment would
/// resolve these per project from [`fleet_stores::credentials::CredentialStore`]
/// on each call instead; see DESIGN.md.
fn build_vcs() -> Option<Arc<dyn VersionControl>> {
    let base_url = env_opt("GITLAB_BASE_URL")?;
    let project_id = env_opt("GITLAB_PROJECT_ID")?;
    let token = env_opt("GITLAB_TOKEN")?;
    Some(Arc::new(GitlabVersionControl::new(base_url, project_id, token)))
}

fn build_issue_tracker() -> Option<Arc<dyn IssueTracker>> {
    let base_url = env_opt("JIRA_BASE_URL")?;
    let project_key = env_opt("JIRA_PROJECT_KEY")?;
    let email = env_opt("JIRA_EMAIL")?;
    let token = env_opt("JIRA_API_TOKEN")?;
    Some(Arc::new(JiraIssueTracker::new(base_url, project_key, email, token)))
}

fn build_design_tool() -> Option<Arc<dyn DesignTool>> {
    let base_url = env_opt("FIGMA_BASE_URL").unwrap_or_else(|| "https://api.figma.com".to_string());
    let token = env_opt("FIGMA_TOKEN")?;
    Some(Arc::new(FigmaDesignTool::new(base_url, token)))
}

fn build_chat() -> Option<Arc<dyn ChatService>> {
    let token = env_opt("SLACK_BOT_TOKEN")?;
    Some(Arc::new(SlackChatService::new(token)))
}

fn build_monitoring_issues() -> Option<Arc<dyn MonitoringIssues>> {
    let base_url = env_opt("SENTRY_BASE_URL").unwrap_or_else(|| "https://sentry.io".to_string());
    let org_slug = env_opt("SENTRY_ORG_SLUG")?;
    let project_slug = env_opt("SENTRY_PROJECT_SLUG")?;
    let token = env_opt("SENTRY_TOKEN")?;
    Some(Arc::new(SentryMonitoringIssues::new(base_url, org_slug, project_slug, token)))
}

fn build_monitoring_metrics() -> Option<Arc<dyn MonitoringMetrics>> {
    let base_url = env_opt("DATADOG_BASE_URL").unwrap_or_else(|| "https://api.datadoghq.com".to_string());
    let api_key = env_opt("DATADOG_API_KEY")?;
    let app_key = env_opt("DATADOG_APP_KEY")?;
    Some(Arc::new(DatadogMonitoringMetrics::new(base_url, api_key, app_key)))
}

fn build_llm(config: &FleetConfig) -> Arc<dyn LlmClient> {
    let api_key = env::var("ANTHROPIC_API_KEY").unwrap_or_default();
    Arc::new(AnthropicLlmClient::new(api_key).model(config.llm_model.clone()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = FleetConfig::from_env();
    if !config.agents_enabled {
        tracing::warn!("AGENTS_ENABLED is false, exiting without starting the fleet");
        return;
    }

    let bus = EventBus::new(config.history_size, 8);
    let audit: Arc<dyn AuditStore> = Arc::new(MemoryAuditStore::new());
    let registry = Arc::new(AgentRegistry::new(bus.clone()).with_audit_store(audit.clone()));
    let scheduler = Scheduler::new(Duration::from_secs(30));

    let credentials = Arc::new(MemoryCredentialStore::new());
    let agent_configs: Arc<MemoryAgentConfigStore> = Arc::new(MemoryAgentConfigStore::new());

    let llm = build_llm(&config);
    let vcs = build_vcs();
    let issue_tracker = build_issue_tracker();
    let design_tool = build_design_tool();
    let chat = build_chat();
    let monitoring_issues = build_monitoring_issues();
    let monitoring_metrics = build_monitoring_metrics();
    let readiness = MrReadinessTracker::new();

    registry.register(Arc::new(ProductIntelligenceAgent::new(llm.clone(), issue_tracker.clone()))).await;
    registry.register(Arc::new(DesignSyncAgent::new(llm.clone(), design_tool.clone(), issue_tracker.clone()))).await;
    registry.register(Arc::new(CodeOrchestrationAgent::new(llm.clone(), vcs.clone()))).await;
    registry.register(Arc::new(SecurityComplianceAgent::new(llm.clone(), vcs.clone()))).await;
    registry.register(Arc::new(TestIntelligenceAgent::new(llm.clone(), vcs.clone()))).await;
    registry
        .register(Arc::new(ReviewCoordinationAgent::new(
            llm.clone(),
            vcs.clone(),
            readiness.clone(),
            agent_configs.clone(),
            true,
        )))
        .await;
    registry
        .register(Arc::new(DeploymentOrchestratorAgent::new(
            llm.clone(),
            vcs.clone(),
            monitoring_issues.clone(),
            monitoring_metrics.clone(),
            config.deploy_unhealthy_on_no_monitoring,
        )))
        .await;

    let analytics = Arc::new(AnalyticsInsightsAgent::new(
        llm.clone(),
        monitoring_metrics.clone(),
        agent_configs.clone(),
        bus.clone(),
        vec![None],
    ));
    registry.register(analytics.clone()).await;

    if let Some(chat) = chat {
        registry
            .register(Arc::new(ChatNotifierAgent::new(chat, credentials.clone(), config.chat_default_channel.clone())))
            .await;
    }

    scheduler
        .add_job("analytics_insights", config.analytics_interval(), move || {
            let analytics = analytics.clone();
            async move { analytics.run_scheduled_tick().await }
        })
        .await
        .expect("analytics_insights job registered exactly once at startup");

    registry.start_all().await;
    scheduler.start().await;

    let state = Arc::new(AppState { registry: registry.clone(), credentials, agent_configs, audit, config: config.clone() });
    let app = fleet_webhook::router(state);

    let port = env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080u16);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.expect("failed to bind HTTP listener");
    tracing::info!(port, "fleet listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.expect("server error");

    scheduler.stop().await;
    registry.stop_all().await;
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
