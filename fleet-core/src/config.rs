//! Process-level configuration, loaded from the environment (and an
//! optional `.env` file) per SPEC_FULL.md §6.4/§10.
//!
//! There is no precedent in this crate family for a config-building
//! crate (`figment`, `envy`); introducing one here would be an
//! unjustified new dependency for a half-dozen scalar settings, so
//! this is a small explicit loader instead, in the shape of
//! `config.py`'s `Settings` from the system this was distilled from.

use std::env;
use std::time::Duration;

/// The closed configuration set from SPEC_FULL.md §6.4.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Toggles the fleet at process start.
    pub agents_enabled: bool,
    /// Interval for scheduled analytics.
    pub agent_analytics_schedule_hours: u64,
    /// Review SLA for reminders.
    pub agent_review_sla_hours: u64,
    /// Fallback chat channel when no per-project override exists.
    pub chat_default_channel: String,
    /// Shared secret required to validate design webhooks, if set.
    pub design_webhook_secret: Option<String>,
    /// Ring-buffer capacity.
    pub history_size: usize,
    /// Default LLM model identifier.
    pub llm_model: String,
    /// Default LLM max output tokens.
    pub llm_max_tokens: u32,
    /// Default LLM sampling temperature.
    pub llm_temperature: f32,
    /// Whether an absence of monitoring services during post-deploy
    /// health check is treated as unhealthy (conservative default) or
    /// healthy. See SPEC_FULL.md Open Question 1.
    pub deploy_unhealthy_on_no_monitoring: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            agents_enabled: true,
            agent_analytics_schedule_hours: 24,
            agent_review_sla_hours: 24,
            chat_default_channel: "general".to_string(),
            design_webhook_secret: None,
            history_size: crate::bus::DEFAULT_HISTORY_CAPACITY,
            llm_model: "claude-sonnet-4-20250514".to_string(),
            llm_max_tokens: 1024,
            llm_temperature: 0.2,
            deploy_unhealthy_on_no_monitoring: true,
        }
    }
}

impl FleetConfig {
    /// Load `.env` (if present, ignoring a missing file) then read
    /// every key in the closed set from the environment, falling back
    /// to defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Self {
            agents_enabled: env_bool("AGENTS_ENABLED", defaults.agents_enabled),
            agent_analytics_schedule_hours: env_u64(
                "AGENT_ANALYTICS_SCHEDULE_HOURS",
                defaults.agent_analytics_schedule_hours,
            ),
            agent_review_sla_hours: env_u64("AGENT_REVIEW_SLA_HOURS", defaults.agent_review_sla_hours),
            chat_default_channel: env::var("CHAT_DEFAULT_CHANNEL").unwrap_or(defaults.chat_default_channel),
            design_webhook_secret: env::var("DESIGN_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            history_size: env_u64("HISTORY_SIZE", defaults.history_size as u64) as usize,
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_max_tokens: env_u64("LLM_MAX_TOKENS", defaults.llm_max_tokens as u64) as u32,
            llm_temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.llm_temperature),
            deploy_unhealthy_on_no_monitoring: env_bool(
                "DEPLOY_UNHEALTHY_ON_NO_MONITORING",
                defaults.deploy_unhealthy_on_no_monitoring,
            ),
        }
    }

    /// The configured scheduler interval for the analytics job.
    pub fn analytics_interval(&self) -> Duration {
        Duration::from_secs(self.agent_analytics_schedule_hours * 3600)
    }

    /// The configured review SLA as a duration.
    pub fn review_sla(&self) -> Duration {
        Duration::from_secs(self.agent_review_sla_hours * 3600)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = FleetConfig::default();
        assert_eq!(cfg.agent_analytics_schedule_hours, 24);
        assert_eq!(cfg.agent_review_sla_hours, 24);
        assert_eq!(cfg.history_size, 1000);
        assert!(cfg.deploy_unhealthy_on_no_monitoring);
    }
}
