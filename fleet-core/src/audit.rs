//! Persisted audit trail (§3 "Audit Event", §6.5 `agent_events`).
//!
//! The trait and record types live here (rather than in `fleet-stores`)
//! because [`crate::agent::AgentRuntime`] — the one place every
//! dispatch passes through — needs to call [`AuditStore::record`]
//! without `fleet-core` depending on `fleet-stores`. Concrete stores
//! (e.g. `fleet_stores::audit::MemoryAuditStore`) implement the trait
//! from the other side of that boundary.

use crate::event::{Event, EventKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of an audited handler invocation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// The handler completed without error.
    Processed,
    /// The handler returned an error.
    Error,
}

/// A mirror of [`Event`] plus processing outcome (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The event this record audits.
    pub event: Event,
    /// Processing outcome.
    pub status: AuditStatus,
    /// Error message, if `status` is [`AuditStatus::Error`].
    pub error_message: Option<String>,
    /// Wall-clock milliseconds the handler took, if known.
    pub processing_ms: Option<f64>,
}

/// Append-only audit trail, queryable by the operator HTTP surface's
/// `GET /projects/{pid}/agents/events` endpoint.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record.
    async fn record(&self, record: AuditRecord);

    /// Most recent `limit` records for `project` (or fleet-wide if
    /// `None`), optionally filtered by event kind, newest first.
    async fn recent(&self, project: Option<i64>, kind: Option<EventKind>, limit: usize) -> Vec<AuditRecord>;
}
