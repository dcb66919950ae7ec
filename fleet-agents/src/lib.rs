#![deny(missing_docs)]
//! # fleet-agents — the nine concrete delivery agents
//!
//! Each module is one agent: a capability-trait consumer that
//! subscribes to a handful of [`fleet_core::event::EventKind`]s and
//! reacts by calling an LLM, an adapter, or both. None of them know
//! about each other directly — coordination happens entirely through
//! events published back onto the bus.

pub mod analytics_insights;
pub mod chat_notifier;
pub mod code_orchestration;
pub mod deployment_orchestrator;
pub mod design_sync;
pub mod product_intelligence;
pub mod review_coordination;
pub mod security_compliance;
pub mod slug;
pub mod test_intelligence;

/// Hard cap on an outbound VCS/chat comment body, in bytes. Vendor APIs
/// reject or silently clip much larger bodies; agents truncate before
/// posting instead of letting the call fail.
pub const MAX_COMMENT_LEN: usize = 60_000;

const TRUNCATION_SUFFIX: &str = "\n\n*...truncated*";

/// Truncate `comment` to [`MAX_COMMENT_LEN`], appending a suffix that
/// makes the truncation visible to whoever reads it.
pub fn truncate_comment(comment: &str) -> String {
    if comment.len() <= MAX_COMMENT_LEN {
        return comment.to_string();
    }
    let cutoff = MAX_COMMENT_LEN.saturating_sub(TRUNCATION_SUFFIX.len());
    let mut boundary = cutoff.min(comment.len());
    while boundary > 0 && !comment.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}{TRUNCATION_SUFFIX}", &comment[..boundary])
}

/// Re-exports of all nine agent constructors for the composition root.
pub mod prelude {
    pub use crate::analytics_insights::AnalyticsInsightsAgent;
    pub use crate::chat_notifier::ChatNotifierAgent;
    pub use crate::code_orchestration::CodeOrchestrationAgent;
    pub use crate::deployment_orchestrator::DeploymentOrchestratorAgent;
    pub use crate::design_sync::DesignSyncAgent;
    pub use crate::product_intelligence::ProductIntelligenceAgent;
    pub use crate::review_coordination::ReviewCoordinationAgent;
    pub use crate::security_compliance::SecurityComplianceAgent;
    pub use crate::test_intelligence::TestIntelligenceAgent;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_comment_is_unchanged() {
        assert_eq!(truncate_comment("hello"), "hello");
    }

    #[test]
    fn long_comment_is_truncated_with_suffix() {
        let long = "a".repeat(MAX_COMMENT_LEN + 500);
        let truncated = truncate_comment(&long);
        assert!(truncated.len() <= MAX_COMMENT_LEN);
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
    }
}
