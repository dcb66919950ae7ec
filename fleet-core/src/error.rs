//! Crate-local error types for the event bus, agent registry, and scheduler.

use thiserror::Error;

/// Errors raised by [`crate::bus::EventBus`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    /// `publish` was called after `stop()`.
    #[error("bus has been stopped")]
    Stopped,

    /// The dispatch worker pool was saturated for longer than the publish
    /// timeout (default 5s).
    #[error("dispatch pool saturated, publish timed out")]
    Saturated,

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors surfaced by an agent's `handle` implementation.
///
/// The agent base contract (see [`crate::agent::Dispatch`]) never lets
/// these propagate past a single handler invocation — they are recorded
/// in metrics and turned into a synthetic `agent_error` event instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// A call to an external service adapter failed transiently
    /// (timeout, 5xx, connection reset). The handler should treat the
    /// affected sub-result as skipped and continue, not return this.
    #[error("transient external error: {0}")]
    TransientExternal(String),

    /// A call to an external service adapter failed permanently
    /// (4xx other than a recognized non-fatal case).
    #[error("permanent external error: {0}")]
    PermanentExternal(String),

    /// The LLM response failed to parse or was missing required keys
    /// and no fallback applied cleanly. Agents should prefer to recover
    /// with a per-prompt fallback rather than return this.
    #[error("llm response invalid: {0}")]
    LlmInvalid(String),

    /// Catch-all for anything else — an unexpected programming error.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by [`crate::scheduler::Scheduler`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A named job is already registered.
    #[error("job already registered: {0}")]
    DuplicateJob(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
