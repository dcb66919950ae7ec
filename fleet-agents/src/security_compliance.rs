//! Security & Compliance Agent (§4.8).

use crate::truncate_comment;
use async_trait::async_trait;
use fleet_adapters::traits::VersionControl;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use std::sync::Arc;

fn risk_rank(risk: &str) -> u8 {
    match risk {
        "critical" => 3,
        "high" => 2,
        "medium" => 1,
        _ => 0,
    }
}

/// Reacts to `pr_opened`/`code_pushed` by scanning the diff for
/// vulnerabilities. Server-side invariants override whatever the LLM
/// reports: a critical/high vulnerability always forces `passed=false`
/// and `overall_risk` at least `high`.
pub struct SecurityComplianceAgent {
    llm: Arc<dyn LlmClient>,
    vcs: Option<Arc<dyn VersionControl>>,
    kinds: Vec<EventKind>,
}

impl SecurityComplianceAgent {
    /// `vcs` is required to fetch a diff and post findings; with no
    /// credential configured the agent still publishes a conservative
    /// scan result so downstream readiness tracking proceeds.
    pub fn new(llm: Arc<dyn LlmClient>, vcs: Option<Arc<dyn VersionControl>>) -> Self {
        Self { llm, vcs, kinds: vec![EventKind::PrOpened, EventKind::CodePushed] }
    }

    /// The conservative fallback from §11: on total LLM failure, treat
    /// the change as unreviewed rather than silently passing it.
    fn conservative_fallback(&self) -> serde_json::Value {
        serde_json::json!({
            "vulnerabilities": [],
            "overall_risk": "unknown",
            "passed": false,
            "summary": "LLM analysis unavailable; manual review required.",
        })
    }
}

#[async_trait]
impl Agent for SecurityComplianceAgent {
    fn name(&self) -> &str {
        "security_compliance"
    }

    fn description(&self) -> &str {
        "Scans diffs for vulnerabilities and blocks merges on critical findings"
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
                        tracing::warn!(error = %err, "failed to fetch diff");
                        String::new()
                    }
                },
                _ => String::new(),
            },
        };

        if diff.is_empty() {
            tracing::debug!("empty diff, skipping security scan");
            return Ok(());
        }

        let prompt = Prompt {
            system: "You are a security reviewer. Respond with JSON only: \
                     {vulnerabilities: [{severity: critical|high|medium|low, description}], \
                     overall_risk: critical|high|medium|low, passed: bool, summary: string}."
                .to_string(),
            user: format!("Diff:\n{diff}"),
            max_tokens: 2048,
            temperature: 0.1,
        };
        let required = ["vulnerabilities", "overall_risk", "passed", "summary"];
        let mut result = call_json(self.llm.as_ref(), prompt, &required, self.conservative_fallback()).await;

        let vulnerabilities = result.get("vulnerabilities").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let has_critical_or_high = vulnerabilities
            .iter()
            .any(|v| matches!(v.get("severity").and_then(|s| s.as_str()), Some("critical") | Some("high")));

        if has_critical_or_high {
            result["passed"] = serde_json::json!(false);
            let current_risk = result.get("overall_risk").and_then(|v| v.as_str()).unwrap_or("unknown");
            if risk_rank(current_risk) < risk_rank("high") {
                result["overall_risk"] = serde_json::json!("high");
            }
        }

        if let Some(vcs) = &self.vcs {
            if mr_iid != 0 {
                let summary = result.get("summary").and_then(|v| v.as_str()).unwrap_or_default();
                let comment = truncate_comment(summary);
                if let Err(err) = vcs.add_mr_comment(mr_iid, &comment).await {
                    tracing::warn!(error = %err, "failed to post security findings comment");
                }

                let has_critical = vulnerabilities
                    .iter()
                    .any(|v| v.get("severity").and_then(|s| s.as_str()) == Some("critical"));
                if has_critical {
                    if let Err(err) = vcs.create_discussion(mr_iid, "Critical vulnerability found; merge blocked.").await {
                        tracing::warn!(error = %err, "failed to open critical-vulnerability discussion");
                    }
                    ctx.publish_derived(event, EventKind::MergeBlocked, serde_json::json!({"mr_iid": mr_iid}), self.name())
                        .await;
                }
            }
        }

        ctx.publish_derived(event, EventKind::SecurityScanComplete, result.clone(), self.name()).await;
        ctx.publish_derived(
            event,
            EventKind::ComplianceReportGenerated,
            serde_json::json!({"mr_iid": mr_iid, "overall_risk": result["overall_risk"]}),
            self.name(),
        )
        .await;
        if !vulnerabilities.is_empty() {
            ctx.publish_derived(event, EventKind::VulnerabilityFound, serde_json::json!({"vulnerabilities": vulnerabilities}), self.name())
                .await;
        }
        ctx.publish_derived(
            event,
            EventKind::ChatNotification,
            serde_json::json!({"text": format!("Security scan complete: passed={}", result["passed"])}),
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

    struct FakeVcs;

    #[async_trait::async_trait]
    impl VersionControl for FakeVcs {
        async fn create_branch(&self, _b: &str, _s: &str) -> Result<(), fleet_adapters::error::AdapterError> {
            Ok(())
        }
        async fn create_file(&self, _b: &str, _f: &fleet_adapters::traits::FileChange, _m: &str) -> Result<(), fleet_adapters::error::AdapterError> {
            Ok(())
        }
        async fn create_merge_request(
            &self,
            _s: &str,
            _t: &str,
            _title: &str,
            _d: &str,
            _r: &[i64],
        ) -> Result<fleet_adapters::traits::MergeRequest, fleet_adapters::error::AdapterError> {
            Ok(fleet_adapters::traits::MergeRequest { iid: 1, web_url: String::new() })
        }
        async fn get_diff(&self, _mr: i64) -> Result<String, fleet_adapters::error::AdapterError> {
            Ok("+ unsafe { std::mem::transmute(x) }".to_string())
        }
        async fn add_mr_comment(&self, _mr: i64, _b: &str) -> Result<(), fleet_adapters::error::AdapterError> {
            Ok(())
        }
        async fn merge(&self, _mr: i64) -> Result<(), fleet_adapters::error::AdapterError> {
            Ok(())
        }
        async fn list_members(&self) -> Result<Vec<fleet_adapters::traits::ProjectMember>, fleet_adapters::error::AdapterError> {
            Ok(vec![])
        }
        async fn get_pipelines(&self, _r: Option<&str>) -> Result<Vec<fleet_adapters::traits::Pipeline>, fleet_adapters::error::AdapterError> {
            Ok(vec![])
        }
        async fn trigger_pipeline(
            &self,
            _r: &str,
            _v: &std::collections::HashMap<String, String>,
        ) -> Result<fleet_adapters::traits::Pipeline, fleet_adapters::error::AdapterError> {
            Ok(fleet_adapters::traits::Pipeline { id: 1, status: "running".into(), git_ref: _r.to_string() })
        }
        async fn create_discussion(&self, _mr: i64, _b: &str) -> Result<(), fleet_adapters::error::AdapterError> {
            Ok(())
        }
        async fn get_commits(&self, _r: &str, _l: u32) -> Result<Vec<fleet_adapters::traits::Commit>, fleet_adapters::error::AdapterError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn llm_reported_low_risk_with_high_vuln_is_overridden() {
        let llm = Arc::new(FixedLlm(
            r#"{"vulnerabilities":[{"severity":"high","description":"sqli"}],"overall_risk":"low","passed":true,"summary":"s"}"#,
        ));
        let agent = SecurityComplianceAgent::new(llm, Some(Arc::new(FakeVcs)));
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::PrOpened, serde_json::json!({"mr_iid": 1}), "gitlab_webhook", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let history = bus.history(10, Some(EventKind::SecurityScanComplete), None).await;
        assert_eq!(history[0].payload["passed"], false);
        assert_eq!(history[0].payload["overall_risk"], "high");
        bus.stop().await;
    }

    #[tokio::test]
    async fn empty_diff_is_skipped() {
        struct EmptyDiffVcs;
        #[async_trait::async_trait]
        impl VersionControl for EmptyDiffVcs {
            async fn create_branch(&self, _b: &str, _s: &str) -> Result<(), fleet_adapters::error::AdapterError> { Ok(()) }
            async fn create_file(&self, _b: &str, _f: &fleet_adapters::traits::FileChange, _m: &str) -> Result<(), fleet_adapters::error::AdapterError> { Ok(()) }
            async fn create_merge_request(&self, _s: &str, _t: &str, _title: &str, _d: &str, _r: &[i64]) -> Result<fleet_adapters::traits::MergeRequest, fleet_adapters::error::AdapterError> {
                Ok(fleet_adapters::traits::MergeRequest { iid: 1, web_url: String::new() })
            }
            async fn get_diff(&self, _mr: i64) -> Result<String, fleet_adapters::error::AdapterError> { Ok(String::new()) }
            async fn add_mr_comment(&self, _mr: i64, _b: &str) -> Result<(), fleet_adapters::error::AdapterError> { Ok(()) }
            async fn merge(&self, _mr: i64) -> Result<(), fleet_adapters::error::AdapterError> { Ok(()) }
            async fn list_members(&self) -> Result<Vec<fleet_adapters::traits::ProjectMember>, fleet_adapters::error::AdapterError> { Ok(vec![]) }
            async fn get_pipelines(&self, _r: Option<&str>) -> Result<Vec<fleet_adapters::traits::Pipeline>, fleet_adapters::error::AdapterError> { Ok(vec![]) }
            async fn trigger_pipeline(&self, _r: &str, _v: &std::collections::HashMap<String, String>) -> Result<fleet_adapters::traits::Pipeline, fleet_adapters::error::AdapterError> {
                Ok(fleet_adapters::traits::Pipeline { id: 1, status: "running".into(), git_ref: _r.to_string() })
            }
            async fn create_discussion(&self, _mr: i64, _b: &str) -> Result<(), fleet_adapters::error::AdapterError> { Ok(()) }
            async fn get_commits(&self, _r: &str, _l: u32) -> Result<Vec<fleet_adapters::traits::Commit>, fleet_adapters::error::AdapterError> { Ok(vec![]) }
        }

        let agent = SecurityComplianceAgent::new(Arc::new(FixedLlm("{}")), Some(Arc::new(EmptyDiffVcs)));
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let ctx = AgentContext::new(bus.clone());
        let event = Event::new(EventKind::PrOpened, serde_json::json!({"mr_iid": 1}), "gitlab_webhook", Some(1));
        agent.handle(&event, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(bus.history(10, Some(EventKind::SecurityScanComplete), None).await.len(), 0);
        bus.stop().await;
    }
}
