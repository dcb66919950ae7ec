//! Resolves an inbound webhook's external identifier to a project, by
//! scanning the credential store for a matching `external_project_id`
//! or `file_key` (§6.1: "Project scope resolved by matching external
//! project id ... against the credential store.").

use fleet_stores::credentials::{CredentialStore, ServiceKind};

/// Find the project whose `service` credential config has `config_key`
/// equal to `external_value`. `None` if no credential matches — the
/// resulting event is then published fleet-wide.
pub async fn resolve_project(
    credentials: &dyn CredentialStore,
    service: ServiceKind,
    config_key: &str,
    external_value: &str,
) -> Option<i64> {
    credentials
        .list_for_service(service)
        .await
        .into_iter()
        .find(|(_, credential)| {
            credential
                .config
                .get(config_key)
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
                .is_some_and(|v| v == external_value)
        })
        .and_then(|(project, _)| project)
}
