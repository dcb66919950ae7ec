//! Errors from a store call.

use thiserror::Error;

/// Errors raised by [`crate::credentials::CredentialStore`],
/// [`crate::agent_config::AgentConfigStore`], or [`crate::audit::AuditStore`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the given key.
    #[error("no row for {0}")]
    NotFound(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
