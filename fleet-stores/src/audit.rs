//! In-memory [`AuditStore`] implementation.
//!
//! The trait and record types live in `fleet-core` (see
//! [`fleet_core::audit`]) since the runtime that needs to call them,
//! [`fleet_core::agent::AgentRuntime`], cannot depend on this crate —
//! this crate depends on `fleet-core`, not the other way around.

use async_trait::async_trait;
pub use fleet_core::audit::{AuditRecord, AuditStatus, AuditStore};
use fleet_core::event::EventKind;
use tokio::sync::RwLock;

/// In-memory [`AuditStore`] backed by a `Vec` behind a lock. Bounded
/// only by process lifetime — unlike the bus's ring buffer, the audit
/// trail is meant to be durable in a real deployment; a production
/// store would back this with a database table per §6.5.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, record: AuditRecord) {
        self.records.write().await.push(record);
    }

    async fn recent(&self, project: Option<i64>, kind: Option<EventKind>, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .rev()
            .filter(|r| project.is_none() || r.event.project_scope == project)
            .filter(|r| kind.is_none_or(|k| r.event.kind == k))
            .take(limit)
            .cloned()
            .collect()
    }
}
