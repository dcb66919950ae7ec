//! Errors from the LLM capability.

use thiserror::Error;

/// Errors raised by an [`crate::client::LlmClient`] implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP request itself failed (network, timeout).
    #[error("llm request failed: {0}")]
    Request(String),

    /// The provider returned a non-success HTTP status.
    #[error("llm provider returned status {status}: {body}")]
    Provider {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The response body was not valid JSON, or was JSON but not a
    /// completion response shape this client understands.
    #[error("llm response malformed: {0}")]
    Malformed(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
