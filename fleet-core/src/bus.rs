//! The in-process publish/subscribe event bus.
//!
//! A single dispatch task pulls events off an internal queue and fans
//! each one out to its subscribers as independent tasks. A bounded
//! worker-pool semaphore provides backpressure: when the pool is
//! saturated, `publish` blocks briefly and then fails rather than
//! growing the queue without bound.

use crate::error::BusError;
use crate::event::{Event, EventKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Default ring-buffer capacity when none is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// How long `publish` waits for dispatch-pool capacity before failing.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can react to a dispatched event.
///
/// `AgentRuntime` (in [`crate::agent`]) is the only production
/// implementation; tests can implement this directly for bus-level
/// unit tests that don't need a full agent.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one dispatched event. Must not panic across a suspension
    /// point left poisoned — failures are the handler's own concern to
    /// report (agents do this via the base contract).
    async fn handle_event(&self, event: Event);
}

/// Opaque handle returned by [`EventBus::subscribe`], used to
/// [`EventBus::unsubscribe`] later.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SubscriptionId(u64);

struct QueuedEvent {
    event: Event,
    permit: Arc<OwnedSemaphorePermit>,
}

struct Inner {
    subscribers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Arc<dyn EventHandler>)>>>,
    history: Mutex<VecDeque<Event>>,
    history_capacity: usize,
    queue_tx: Mutex<Option<mpsc::UnboundedSender<QueuedEvent>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    pool: Arc<Semaphore>,
    next_sub_id: AtomicU64,
    stopped: AtomicBool,
}

/// The event bus. Cheap to clone — all clones share the same state.
#[derive(Clone)]
pub struct EventBus(Arc<Inner>);

impl EventBus {
    /// Build a new bus with the given history capacity and dispatch
    /// pool size. The bus is created stopped; call [`EventBus::start`]
    /// before publishing.
    pub fn new(history_capacity: usize, pool_size: usize) -> Self {
        Self(Arc::new(Inner {
            subscribers: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            queue_tx: Mutex::new(None),
            dispatch_task: Mutex::new(None),
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            next_sub_id: AtomicU64::new(0),
            stopped: AtomicBool::new(true),
        }))
    }

    /// Construct with the default history capacity and a pool sized
    /// `max(32, 4 * agent_count)`, per the bus's resource model.
    pub fn with_agent_count(agent_count: usize) -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, (4 * agent_count).max(32))
    }

    /// Add a handler to the end of `kind`'s subscriber list.
    pub async fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.0.next_sub_id.fetch_add(1, Ordering::SeqCst));
        let mut subs = self.0.subscribers.lock().await;
        subs.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove the first handler registered under `id` for `kind`.
    pub async fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        let mut subs = self.0.subscribers.lock().await;
        if let Some(list) = subs.get_mut(&kind) {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
            }
        }
    }

    /// Idempotent. Launches the dispatch loop if it isn't already
    /// running.
    pub async fn start(&self) {
        let mut task = self.0.dispatch_task.lock().await;
        if task.is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.0.queue_tx.lock().await = Some(tx);
        self.0.stopped.store(false, Ordering::SeqCst);
        let inner = self.0.clone();
        *task = Some(tokio::spawn(dispatch_loop(inner, rx)));
    }

    /// Idempotent. New publishes after this fail with
    /// [`BusError::Stopped`]; the dispatch task exits once the queue
    /// drains.
    pub async fn stop(&self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.queue_tx.lock().await.take();
        if let Some(handle) = self.0.dispatch_task.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Append to history and enqueue for dispatch. Never blocks
    /// indefinitely: fails with [`BusError::Saturated`] if the
    /// dispatch pool stays full past the publish timeout, or
    /// [`BusError::Stopped`] if the bus has been stopped.
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        if self.0.stopped.load(Ordering::SeqCst) {
            return Err(BusError::Stopped);
        }

        {
            let mut history = self.0.history.lock().await;
            history.push_back(event.clone());
            while history.len() > self.0.history_capacity {
                history.pop_front();
            }
        }

        let permit = match tokio::time::timeout(PUBLISH_TIMEOUT, self.0.pool.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Arc::new(permit),
            Ok(Err(_)) => return Err(BusError::Stopped),
            Err(_) => return Err(BusError::Saturated),
        };

        let tx_guard = self.0.queue_tx.lock().await;
        match tx_guard.as_ref() {
            Some(tx) => tx
                .send(QueuedEvent { event, permit })
                .map_err(|_| BusError::Stopped),
            None => Err(BusError::Stopped),
        }
    }

    /// The most recent `limit` events, optionally filtered by `kind`
    /// and/or `project`, newest excluded-reversed into chronological
    /// order. Returns cloned copies — callers cannot mutate history.
    pub async fn history(&self, limit: usize, kind: Option<EventKind>, project: Option<i64>) -> Vec<Event> {
        let history = self.0.history.lock().await;
        let mut matched: Vec<Event> = history
            .iter()
            .rev()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| project.is_none_or(|p| e.project_scope == Some(p)))
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }
}

async fn dispatch_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<QueuedEvent>) {
    while let Some(queued) = rx.recv().await {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let subs = inner.subscribers.lock().await;
            subs.get(&queued.event.kind)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            // Recorded in history already; nothing further to do.
            continue;
        }

        for handler in handlers {
            let event = queued.event.clone();
            let permit = queued.permit.clone();
            tokio::spawn(async move {
                handler.handle_event(event).await;
                drop(permit);
            });
        }
    }
}
