#![deny(missing_docs)]
//! # fleet-stores — credential, config, and audit persistence
//!
//! | module | purpose |
//! |---|---|
//! | [`credentials`] | `CredentialStore`, masking |
//! | [`agent_config`] | `AgentConfigStore` |
//! | [`audit`] | `AuditStore` |
//! | [`error`] | `StoreError` |
//!
//! All three stores ship only an in-memory implementation here — a
//! database-backed implementation is a drop-in replacement behind the
//! same traits per §6.5's logical layout, not something this workspace
//! needs to provide to satisfy the runtime's contract with its stores.

pub mod agent_config;
pub mod audit;
pub mod credentials;
pub mod error;

/// Convenience re-exports.
pub mod prelude {
    pub use crate::agent_config::{AgentConfig, AgentConfigStore, MemoryAgentConfigStore};
    pub use crate::audit::{AuditRecord, AuditStatus, AuditStore, MemoryAuditStore};
    pub use crate::credentials::{mask_credential, mask_secret, CredentialStore, MemoryCredentialStore, ServiceCredential, ServiceKind};
    pub use crate::error::StoreError;
}
