#![deny(missing_docs)]
//! # fleet-llm — the LLM capability
//!
//! | module | purpose |
//! |---|---|
//! | [`client`] | `LlmClient` trait and an Anthropic Messages API implementation |
//! | [`error`] | `LlmError` |
//! | [`json`] | fence-stripping, fallback-filling, and the `call_json` orchestration helper |
//!
//! Agents never talk to a provider's wire format directly — they hold
//! an `Arc<dyn LlmClient>` and call [`json::call_json`] with a
//! per-prompt fallback, so a provider outage degrades a single agent's
//! output instead of propagating as a hard error.

pub mod client;
pub mod error;
pub mod json;

/// Convenience re-exports for the common case of holding a client and
/// calling [`json::call_json`].
pub mod prelude {
    pub use crate::client::{AnthropicLlmClient, LlmClient, Prompt};
    pub use crate::error::LlmError;
    pub use crate::json::call_json;
}
