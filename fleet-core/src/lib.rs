#![deny(missing_docs)]
//! # fleet-core — the event-driven agent runtime
//!
//! The hardest part of the delivery fleet: the event bus, the agent
//! base contract, the registry, the scheduler, and the MR readiness
//! tracker. Everything here is domain-agnostic — it knows nothing
//! about GitLab, Figma, or an LLM. Concrete agents (in `fleet-agents`)
//! hold those capabilities themselves and implement [`agent::Agent`].
//!
//! ## Modules
//!
//! | Module | What it does |
//! |--------|---------------|
//! | [`event`] | The [`event::Event`] value and closed [`event::EventKind`] enum |
//! | [`bus`] | In-process publish/subscribe dispatcher with bounded history |
//! | [`agent`] | The agent contract and the uniform dispatch wrapper |
//! | [`registry`] | Owns agent instances, wires subscriptions |
//! | [`scheduler`] | Periodic job runner |
//! | [`readiness`] | The MR readiness tracker for auto-merge coordination |
//! | [`audit`] | The audit-trail trait recorded on every dispatch |
//! | [`config`] | Process-level configuration |
//! | [`error`] | Crate-local error types |

pub mod agent;
pub mod audit;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod readiness;
pub mod registry;

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::agent::{Agent, AgentContext, AgentDescriptor, AgentMetrics, AgentRuntime, AgentStatus};
    pub use crate::audit::{AuditRecord, AuditStatus, AuditStore};
    pub use crate::bus::{EventBus, EventHandler, SubscriptionId};
    pub use crate::config::FleetConfig;
    pub use crate::error::{AgentError, BusError, SchedulerError};
    pub use crate::event::{Event, EventId, EventKind};
    pub use crate::readiness::{MrReadinessTracker, ReadinessRecord};
    pub use crate::registry::AgentRegistry;
    pub use crate::scheduler::Scheduler;
}

pub mod scheduler;
