//! Shared application state handed to every route.

use fleet_core::audit::AuditStore;
use fleet_core::config::FleetConfig;
use fleet_core::registry::AgentRegistry;
use fleet_stores::agent_config::AgentConfigStore;
use fleet_stores::credentials::CredentialStore;
use std::sync::Arc;

/// Everything a route needs: the bus (via the registry), credential
/// lookups for project-scope resolution, and the closed config set.
pub struct AppState {
    /// Owns agent subscriptions and fleet-wide enable/disable/status.
    pub registry: Arc<AgentRegistry>,
    /// Used to resolve an inbound webhook's external id to a project
    /// and, for the operator surface, to mask credentials on read.
    pub credentials: Arc<dyn CredentialStore>,
    /// Per-project agent enable/disable and option overrides.
    pub agent_configs: Arc<dyn AgentConfigStore>,
    /// Per-agent-dispatch audit trail backing `GET /projects/{pid}/agents/events` (§6.5).
    pub audit: Arc<dyn AuditStore>,
    /// The closed configuration set (§6.4).
    pub config: FleetConfig,
}
