//! Owns the set of agent instances, wires their subscriptions at
//! startup, and exposes fleet-wide enable/disable/status operations.

use crate::agent::{Agent, AgentDescriptor, AgentRuntime};
use crate::audit::AuditStore;
use crate::bus::{EventBus, SubscriptionId};
use crate::event::EventKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Registered {
    runtime: Arc<AgentRuntime>,
    subscriptions: Vec<(EventKind, SubscriptionId)>,
}

/// The fleet's agent registry. One instance per process, built by the
/// composition root — never a global singleton.
pub struct AgentRegistry {
    bus: EventBus,
    audit: Option<Arc<dyn AuditStore>>,
    agents: Mutex<HashMap<String, Registered>>,
}

impl AgentRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            audit: None,
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Record every agent dispatch registered from here on to `audit`.
    /// Call before `register`-ing any agent.
    pub fn with_audit_store(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Subscribe `agent` to the bus for each of its declared kinds.
    /// Idempotent per name — registering the same name twice is a
    /// no-op and does not create duplicate subscriptions.
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        let mut agents = self.agents.lock().await;
        if agents.contains_key(&name) {
            return;
        }

        let runtime = AgentRuntime::with_audit(agent, self.bus.clone(), self.audit.clone());
        let mut subscriptions = Vec::new();
        for kind in runtime.subscribed_kinds() {
            let id = self.bus.subscribe(*kind, runtime.clone()).await;
            subscriptions.push((*kind, id));
        }

        agents.insert(name, Registered { runtime, subscriptions });
    }

    /// Starts the bus. Agents are already subscribed from `register`.
    pub async fn start_all(&self) {
        self.bus.start().await;
    }

    /// Unsubscribes every agent, then stops the bus.
    pub async fn stop_all(&self) {
        let mut agents = self.agents.lock().await;
        for (_, registered) in agents.iter() {
            for (kind, id) in &registered.subscriptions {
                self.bus.unsubscribe(*kind, *id).await;
            }
        }
        agents.clear();
        self.bus.stop().await;
    }

    /// Flip an agent's local enabled flag. No-op if unknown.
    pub async fn enable(&self, name: &str) {
        if let Some(r) = self.agents.lock().await.get(name) {
            r.runtime.enable();
        }
    }

    /// Flip an agent's local enabled flag. No-op if unknown. The agent
    /// stays subscribed — disabled agents still receive dispatches and
    /// return immediately, per §4.3.
    pub async fn disable(&self, name: &str) {
        if let Some(r) = self.agents.lock().await.get(name) {
            r.runtime.disable();
        }
    }

    /// Per-agent descriptors including metrics, a point-in-time
    /// snapshot.
    pub async fn status(&self) -> Vec<AgentDescriptor> {
        let agents = self.agents.lock().await;
        let mut out = Vec::with_capacity(agents.len());
        for registered in agents.values() {
            out.push(registered.runtime.descriptor().await);
        }
        out
    }

    /// The bus this registry wires agents onto.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentContext;
    use crate::error::AgentError;
    use crate::event::Event;
    use async_trait::async_trait;

    struct Noop(&'static str, Vec<EventKind>);

    #[async_trait]
    impl Agent for Noop {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "noop"
        }
        fn subscribed_kinds(&self) -> &[EventKind] {
            &self.1
        }
        async fn handle(&self, _event: &Event, _ctx: &AgentContext) -> Result<(), AgentError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn double_register_is_a_noop() {
        let bus = EventBus::new(10, 4);
        let registry = AgentRegistry::new(bus.clone());
        registry.register(Arc::new(Noop("a", vec![EventKind::TicketCreated]))).await;
        registry.register(Arc::new(Noop("a", vec![EventKind::TicketCreated]))).await;
        assert_eq!(registry.status().await.len(), 1);
    }

    #[tokio::test]
    async fn disable_keeps_agent_subscribed_but_idle() {
        let bus = EventBus::new(10, 4);
        registryless_start(&bus).await;
        let registry = AgentRegistry::new(bus.clone());
        registry.register(Arc::new(Noop("a", vec![EventKind::TicketCreated]))).await;
        registry.disable("a").await;
        let status = registry.status().await;
        assert_eq!(status[0].enabled, false);
    }

    async fn registryless_start(bus: &EventBus) {
        bus.start().await;
    }

    use crate::audit::{AuditRecord, AuditStatus};

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
    async fn registered_agents_record_dispatches_to_the_configured_audit_store() {
        let bus = EventBus::new(10, 4);
        bus.start().await;
        let audit = Arc::new(RecordingAudit::default());
        let registry = AgentRegistry::new(bus.clone()).with_audit_store(audit.clone());
        registry.register(Arc::new(Noop("a", vec![EventKind::TicketCreated]))).await;
        bus.publish(Event::new(EventKind::TicketCreated, serde_json::json!({}), "t", None)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(audit.records.lock().await.len(), 1);
        assert_eq!(audit.records.lock().await[0].status, AuditStatus::Processed);
        bus.stop().await;
    }
}
