//! Errors from a capability adapter call.

use thiserror::Error;

/// Errors raised by any [`crate::traits`] implementation.
///
/// Adapters fold HTTP status and transport failures into the three
/// kinds the agent base contract reasons about (see
/// `fleet_core::error::AgentError`): a caller maps [`AdapterError::NotFound`]
/// and [`AdapterError::AlreadyExists`] to a handled permanent case,
/// [`AdapterError::Transient`] to a skip-and-continue, and anything else
/// propagates as a programming error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network error, timeout, or 5xx — the caller may retry later.
    #[error("adapter call failed transiently: {0}")]
    Transient(String),

    /// 404 — the resource does not exist.
    #[error("adapter resource not found: {0}")]
    NotFound(String),

    /// 409 or an equivalent "already exists" condition the caller should
    /// treat as non-fatal (e.g. a branch that already exists).
    #[error("adapter resource already exists: {0}")]
    AlreadyExists(String),

    /// Any other non-success status, or a response shape the adapter
    /// doesn't understand.
    #[error("adapter request rejected: {0}")]
    Rejected(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Map an HTTP status code to an [`AdapterError`], given a label for the
/// resource being acted on (used only in the error message).
pub(crate) fn map_status(status: reqwest::StatusCode, body: &str, resource: &str) -> AdapterError {
    match status.as_u16() {
        404 => AdapterError::NotFound(format!("{resource}: {body}")),
        409 => AdapterError::AlreadyExists(format!("{resource}: {body}")),
        408 | 429 | 500..=599 => AdapterError::Transient(format!("{resource} ({status}): {body}")),
        _ => AdapterError::Rejected(format!("{resource} ({status}): {body}")),
    }
}

/// Map a [`reqwest::Error`] to an [`AdapterError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error, resource: &str) -> AdapterError {
    if err.is_timeout() || err.is_connect() {
        AdapterError::Transient(format!("{resource}: {err}"))
    } else {
        AdapterError::Other(Box::new(err))
    }
}
