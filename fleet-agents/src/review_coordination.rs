//! Review Coordination Agent (§4.10).

use async_trait::async_trait;
use fleet_adapters::traits::VersionControl;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_core::readiness::MrReadinessTracker;
use fleet_llm::client::{LlmClient, Prompt};
use fleet_llm::json::call_json;
use fleet_stores::agent_config::AgentConfigStore;
use std::sync::Arc;

/// Reviewer-scoring constants (Open Question 4 — tunable, not
/// hardcoded magic numbers).
pub const MAINTAINER_ACCESS_LEVEL: i32 = 40;
/// GitLab-style developer access level.
pub const DEVELOPER_ACCESS_LEVEL: i32 = 30;
/// Bonus per expertise-keyword match in a member's username.
pub const EXPERTISE_MATCH_BONUS: i32 = 5;
/// Bonus for a maintainer-level member.
pub const MAINTAINER_BONUS: i32 = 3;
/// Bonus for a developer-level member.
pub const DEVELOPER_BONUS: i32 = 1;
/// Default number of reviewers to auto-assign.
pub const DEFAULT_MIN_REVIEWERS: usize = 2;

/// Tracks merge-request readiness and executes auto-merge once every
/// signal is green.
pub struct ReviewCoordinationAgent {
    llm: Arc<dyn LlmClient>,
    vcs: Option<Arc<dyn VersionControl>>,
    readiness: MrReadinessTracker,
    agent_config_store: Arc<dyn AgentConfigStore>,
    default_auto_merge_enabled: bool,
    min_reviewers: usize,
    kinds: Vec<EventKind>,
}

impl ReviewCoordinationAgent {
    /// `readiness` is shared with whatever else needs to inspect
    /// in-flight MR state (tests, an operator endpoint).
    /// `default_auto_merge_enabled` applies only when a project has no
    /// `review_coordination` config row, or one with no explicit
    /// `auto_merge` option set — see [`Self::auto_merge_enabled`].
    pub fn new(
        llm: Arc<dyn LlmClient>,
        vcs: Option<Arc<dyn VersionControl>>,
        readiness: MrReadinessTracker,
        agent_config_store: Arc<dyn AgentConfigStore>,
        default_auto_merge_enabled: bool,
    ) -> Self {
        Self {
            llm,
            vcs,
            readiness,
            agent_config_store,
            default_auto_merge_enabled,
            min_reviewers: DEFAULT_MIN_REVIEWERS,
            kinds: vec![
                EventKind::PrOpened,
                EventKind::PrReadyForReview,
                EventKind::TestReportCreated,
                EventKind::SecurityScanComplete,
            ],
        }
    }

    /// Per-project `auto_merge` override (§4.10: "project's agent
    /// config: `auto_merge: true`"), read from the `options` map of
    /// this project's `review_coordination` row. Falls back to the
    /// fleet-wide default when no row exists or it leaves `auto_merge`
    /// unset.
    async fn auto_merge_enabled(&self, project: Option<i64>) -> bool {
        self.agent_config_store
            .get(project, "review_coordination")
            .await
            .and_then(|config| config.options.get("auto_merge").and_then(|v| v.as_bool()))
            .unwrap_or(self.default_auto_merge_enabled)
    }

    fn fallback(&self) -> serde_json::Value {
        serde_json::json!({
            "complexity": "medium",
            "risk_areas": [],
            "recommended_expertise": [],
            "estimated_review_minutes": 30,
            "summary": "",
            "auto_merge_eligible": false,
        })
    }

    fn score_member(member: &fleet_adapters::traits::ProjectMember, expertise: &[String]) -> i32 {
        let mut score = 0;
        if member.access_level >= MAINTAINER_ACCESS_LEVEL {
            score += MAINTAINER_BONUS;
        } else if member.access_level >= DEVELOPER_ACCESS_LEVEL {
            score += DEVELOPER_BONUS;
        }
        for keyword in expertise {
            if member.username.to_lowercase().contains(&keyword.to_lowercase()) {
                score += EXPERTISE_MATCH_BONUS;
            }
        }
        score
    }

    async fn assign_reviewers(&self, mr_iid: i64, expertise: &[String]) -> Vec<i64> {
        let Some(vcs) = &self.vcs else { return Vec::new() };
        let members = match vcs.list_members().await {
            Ok(members) => members,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list members for reviewer scoring");
                return Vec::new();
            }
        };
        let mut scored: Vec<_> = members.iter().map(|m| (Self::score_member(m, expertise), m.id)).collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let chosen: Vec<i64> = scored.into_iter().take(self.min_reviewers).map(|(_, id)| id).collect();
        if mr_iid != 0 {
            if let Err(err) = vcs.add_mr_comment(mr_iid, "Reviewers auto-assigned.").await {
                tracing::warn!(error = %err, "failed to post reviewer-assignment comment");
            }
        }
        chosen
    }

    async fn maybe_auto_merge(&self, event: &Event, ctx: &AgentContext, project: Option<i64>, mr_iid: i64) -> Result<(), AgentError> {
        let auto_merge_enabled = self.auto_merge_enabled(project).await;
        let record = self.readiness.entry(project, mr_iid).await;
        // Test-and-set `merge_attempted` under the per-key lock so two
        // signals racing to complete the same MR (e.g. a duplicate
        // `security_scan_complete` racing `test_report_created`)
        // cannot both observe "ready" and both call `vcs.merge`.
        let ready = {
            let mut guard = record.lock().await;
            if guard.merge_attempted || !guard.ready_for_merge(auto_merge_enabled) {
                false
            } else {
                guard.merge_attempted = true;
                true
            }
        };
        if !ready {
            return Ok(());
        }

        if let Some(vcs) = &self.vcs {
            if let Err(err) = vcs.merge(mr_iid).await {
                tracing::warn!(error = %err, "auto-merge attempt failed, readiness record kept intact");
                return Ok(());
            }
        }

        self.readiness.remove(project, mr_iid).await;
        ctx.publish_derived(event, EventKind::PrAutoMerged, serde_json::json!({"mr_iid": mr_iid}), self.name()).await;
        ctx.publish_derived(
            event,
            EventKind::ChatNotification,
            serde_json::json!({"text": format!("MR {mr_iid} auto-merged")}),
            self.name(),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl Agent for ReviewCoordinationAgent {
    fn name(&self) -> &str {
        "review_coordination"
    }

    fn description(&self) -> &str {
        "Tracks merge-request readiness and assigns reviewers, auto-merging when eligible"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError> {
        let mr_iid = event.payload.get("mr_iid").and_then(|v| v.as_i64()).unwrap_or(0);
        let project = event.project_scope;

        match event.kind {
            EventKind::PrOpened | EventKind::PrReadyForReview => {
                let _ = self.readiness.entry(project, mr_iid).await;

                let description = event.payload.get("description").and_then(|v| v.as_str()).unwrap_or_default();
                let prompt = Prompt {
                    system: "You assess a merge request for review. Respond with JSON only: \
                             {complexity: low|medium|high, risk_areas: [string], \
                             recommended_expertise: [string], estimated_review_minutes: number, \
                             summary: string, auto_merge_eligible: bool}."
                        .to_string(),
                    user: description.to_string(),
                    max_tokens: 1024,
                    temperature: 0.2,
                };
                let required =
                    ["complexity", "risk_areas", "recommended_expertise", "estimated_review_minutes", "summary", "auto_merge_eligible"];
                let mut assessment = call_json(self.llm.as_ref(), prompt, &required, self.fallback()).await;

                if assessment.get("complexity").and_then(|v| v.as_str()) == Some("high") {
                    assessment["auto_merge_eligible"] = serde_json::json!(false);
                }

                let eligible = assessment.get("auto_merge_eligible").and_then(|v| v.as_bool()).unwrap_or(false);
                {
                    let record = self.readiness.entry(project, mr_iid).await;
                    record.lock().await.auto_merge_eligible = eligible;
                }

                let expertise: Vec<String> = assessment
                    .get("recommended_expertise")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                let reviewer_ids = self.assign_reviewers(mr_iid, &expertise).await;

                ctx.publish_derived(
                    event,
                    EventKind::ReviewersAssigned,
                    serde_json::json!({"mr_iid": mr_iid, "reviewer_ids": reviewer_ids}),
                    self.name(),
                )
                .await;
                ctx.publish_derived(
                    event,
                    EventKind::ChatNotification,
                    serde_json::json!({"text": assessment["summary"]}),
                    self.name(),
                )
                .await;

                self.maybe_auto_merge(event, ctx, project, mr_iid).await?;
            }
            EventKind::SecurityScanComplete => {
                let passed = event.payload.get("passed").and_then(|v| v.as_bool()).unwrap_or(false);
                let record = self.readiness.entry(project, mr_iid).await;
                record.lock().await.security_passed = passed;
                self.maybe_auto_merge(event, ctx, project, mr_iid).await?;
            }
            EventKind::TestReportCreated => {
                let record = self.readiness.entry(project, mr_iid).await;
                record.lock().await.tests_passed = true;
                self.maybe_auto_merge(event, ctx, project, mr_iid).await?;
            }
            _ => {}
        }

        Ok(())
    }
}
