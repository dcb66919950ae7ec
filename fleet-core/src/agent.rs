//! The agent base contract: uniform dispatch, metrics, and failure
//! isolation wrapped around each agent's business logic.

use crate::audit::{AuditRecord, AuditStatus, AuditStore};
use crate::bus::{EventBus, EventHandler};
use crate::error::AgentError;
use crate::event::{Event, EventKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// What an agent is doing right now.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    Error,
    Disabled,
}

/// Running counters for an agent. `avg_processing_ms` is a running
/// mean over successful handles only — errors are counted but don't
/// move the average.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Count of handler invocations that completed without error.
    pub events_processed: u64,
    /// Count of handler invocations that returned an error.
    pub errors: u64,
    /// Wall-clock milliseconds of the most recent invocation, success
    /// or failure.
    pub last_run_timestamp: Option<u64>,
    /// Running mean of elapsed milliseconds over successful handles.
    pub avg_processing_ms: f64,
}

/// Point-in-time snapshot returned by [`crate::registry::AgentRegistry::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable identifier, unique within the registry.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Event kinds this agent reacts to.
    pub subscribed_kinds: Vec<EventKind>,
    /// Whether the agent is currently enabled.
    pub enabled: bool,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Running counters.
    pub metrics: AgentMetrics,
}

/// What an agent's `handle` gets to do besides return a result: publish
/// further events correlated to the one it's handling.
pub struct AgentContext {
    bus: EventBus,
}

impl AgentContext {
    /// Construct a context over `bus`. Production code gets one from
    /// [`AgentRuntime`]; tests construct one directly to exercise an
    /// agent's `handle` without the full registry/runtime wiring.
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Publish an event derived from `source`, inheriting its
    /// correlation id per the causal-chain rule in §3.
    pub async fn publish_derived(
        &self,
        source: &Event,
        kind: EventKind,
        payload: serde_json::Value,
        from_agent: &str,
    ) {
        let event = Event::derive(source, kind, payload, from_agent);
        if let Err(err) = self.bus.publish(event).await {
            tracing::warn!(agent = from_agent, error = %err, "failed to publish derived event");
        }
    }

    /// Direct access to the bus, for agents that need `history()` or a
    /// top-level (non-derived) publish.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

/// Business logic for one of the nine concrete agents.
///
/// Implementations hold whatever capabilities they need (adapters, an
/// LLM client, stores) as constructor-injected fields — `Agent` itself
/// only describes the dispatch contract.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, unique within the registry.
    fn name(&self) -> &str;
    /// Human-readable description.
    fn description(&self) -> &str;
    /// Event kinds this agent reacts to.
    fn subscribed_kinds(&self) -> &[EventKind];
    /// React to one event. May perform I/O and publish further events
    /// via `ctx`. Errors are recorded by the base contract, never
    /// silently dropped.
    async fn handle(&self, event: &Event, ctx: &AgentContext) -> Result<(), AgentError>;
}

/// Wraps an [`Agent`] with the uniform dispatch behavior from §4.2:
/// enable/disable short-circuiting, status transitions, metrics, and
/// `agent_error` emission on failure.
pub struct AgentRuntime {
    agent: Arc<dyn Agent>,
    bus: EventBus,
    audit: Option<Arc<dyn AuditStore>>,
    enabled: AtomicBool,
    status: Mutex<AgentStatus>,
    metrics: Mutex<AgentMetrics>,
}

impl AgentRuntime {
    pub fn new(agent: Arc<dyn Agent>, bus: EventBus) -> Arc<Self> {
        Self::with_audit(agent, bus, None)
    }

    /// Like [`Self::new`], but records every dispatch to `audit` when
    /// given one. Used by [`crate::registry::AgentRegistry`] when the
    /// composition root has wired in an [`AuditStore`].
    pub fn with_audit(agent: Arc<dyn Agent>, bus: EventBus, audit: Option<Arc<dyn AuditStore>>) -> Arc<Self> {
        Arc::new(Self {
            agent,
            bus,
            audit,
            enabled: AtomicBool::new(true),
            status: Mutex::new(AgentStatus::Idle),
            metrics: Mutex::new(AgentMetrics::default()),
        })
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn subscribed_kinds(&self) -> &[EventKind] {
        self.agent.subscribed_kinds()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub async fn descriptor(&self) -> AgentDescriptor {
        let status = *self.status.lock().await;
        let status = if !self.is_enabled() {
            AgentStatus::Disabled
        } else {
            status
        };
        AgentDescriptor {
            name: self.agent.name().to_string(),
            description: self.agent.description().to_string(),
            subscribed_kinds: self.agent.subscribed_kinds().to_vec(),
            enabled: self.is_enabled(),
            status,
            metrics: self.metrics.lock().await.clone(),
        }
    }
}

#[async_trait]
impl EventHandler for AgentRuntime {
    async fn handle_event(&self, event: Event) {
        if !self.is_enabled() {
            return;
        }

        *self.status.lock().await = AgentStatus::Running;
        let started = Instant::now();
        let ctx = AgentContext::new(self.bus.clone());
        let result = self.agent.handle(&event, &ctx).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut metrics = self.metrics.lock().await;
        metrics.last_run_timestamp = Some(now_millis());

        match result {
            Ok(()) => {
                let n = metrics.events_processed + 1;
                metrics.avg_processing_ms += (elapsed_ms - metrics.avg_processing_ms) / n as f64;
                metrics.events_processed = n;
                drop(metrics);
                *self.status.lock().await = AgentStatus::Idle;
                if let Some(audit) = &self.audit {
                    audit
                        .record(AuditRecord {
                            event: event.clone(),
                            status: AuditStatus::Processed,
                            error_message: None,
                            processing_ms: Some(elapsed_ms),
                        })
                        .await;
                }
            }
            Err(err) => {
                metrics.errors += 1;
                drop(metrics);
                *self.status.lock().await = AgentStatus::Error;
                tracing::warn!(agent = self.agent.name(), kind = %event.kind, error = %err, "agent handler failed");
                if let Some(audit) = &self.audit {
                    audit
                        .record(AuditRecord {
                            event: event.clone(),
                            status: AuditStatus::Error,
                            error_message: Some(err.to_string()),
                            processing_ms: Some(elapsed_ms),
                        })
                        .await;
                }
                let payload = serde_json::json!({
                    "agent_name": self.agent.name(),
                    "source_event_kind": event.kind,
                    "message": err.to_string(),
                    "processing_ms": elapsed_ms,
                });
                let synthetic = Event::derive(&event, EventKind::AgentError, payload, self.agent.name());
                if let Err(publish_err) = self.bus.publish(synthetic).await {
                    tracing::warn!(agent = self.agent.name(), error = %publish_err, "failed to publish agent_error");
                }
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn agent_is_object_safe_send_sync() {
        _assert_send_sync::<Arc<dyn Agent>>();
        _assert_send_sync::<Arc<AgentRuntime>>();
    }

    struct Flaky {
        kinds: Vec<EventKind>,
        fail: bool,
    }

    #[async_trait]
    impl Agent for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "test agent"
        }
        fn subscribed_kinds(&self) -> &[EventKind] {
            &self.kinds
        }
        async fn handle(&self, _event: &Event, _ctx: &AgentContext) -> Result<(), AgentError> {
            if self.fail {
                Err(AgentError::PermanentExternal("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn disabled_agent_short_circuits() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let runtime = AgentRuntime::new(
            Arc::new(Flaky { kinds: vec![EventKind::TicketCreated], fail: false }),
            bus.clone(),
        );
        runtime.disable();
        runtime
            .handle_event(Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None))
            .await;
        let metrics = runtime.descriptor().await;
        assert_eq!(metrics.metrics.events_processed, 0);
        assert_eq!(metrics.status, AgentStatus::Disabled);
        bus.stop().await;
    }

    #[tokio::test]
    async fn failure_emits_agent_error_with_same_correlation_id() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let runtime = AgentRuntime::new(
            Arc::new(Flaky { kinds: vec![EventKind::TicketCreated], fail: true }),
            bus.clone(),
        );
        let input = Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None);
        runtime.handle_event(input.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let history = bus.history(10, Some(EventKind::AgentError), None).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].correlation_id, Some(input.id));
        let desc = runtime.descriptor().await;
        assert_eq!(desc.metrics.errors, 1);
        assert_eq!(desc.status, AgentStatus::Error);
        bus.stop().await;
    }

    #[tokio::test]
    async fn success_updates_running_average() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let runtime = AgentRuntime::new(
            Arc::new(Flaky { kinds: vec![EventKind::TicketCreated], fail: false }),
            bus.clone(),
        );
        for _ in 0..3 {
            runtime
                .handle_event(Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None))
                .await;
        }
        let desc = runtime.descriptor().await;
        assert_eq!(desc.metrics.events_processed, 3);
        assert_eq!(desc.metrics.errors, 0);
        bus.stop().await;
    }

    #[derive(Default)]
    struct RecordingAudit {
        records: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditStore for RecordingAudit {
        async fn record(&self, record: AuditRecord) {
            self.records.lock().await.push(record);
        }
        async fn recent(&self, _project: Option<i64>, _kind: Option<EventKind>, _limit: usize) -> Vec<AuditRecord> {
            self.records.lock().await.clone()
        }
    }

    #[tokio::test]
    async fn both_success_and_failure_are_recorded_to_the_audit_store() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let audit = Arc::new(RecordingAudit::default());
        let runtime = AgentRuntime::with_audit(
            Arc::new(Flaky { kinds: vec![EventKind::TicketCreated], fail: false }),
            bus.clone(),
            Some(audit.clone() as Arc<dyn AuditStore>),
        );
        runtime.handle_event(Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None)).await;

        let failing = AgentRuntime::with_audit(
            Arc::new(Flaky { kinds: vec![EventKind::TicketCreated], fail: true }),
            bus.clone(),
            Some(audit.clone() as Arc<dyn AuditStore>),
        );
        failing.handle_event(Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None)).await;

        let records = audit.recent(None, None, 10).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, AuditStatus::Processed);
        assert_eq!(records[1].status, AuditStatus::Error);
        assert!(records[1].error_message.is_some());
        bus.stop().await;
    }
}
