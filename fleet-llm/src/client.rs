//! The LLM capability trait and an Anthropic Messages API client.

use crate::error::LlmError;
use async_trait::async_trait;

/// Default model when the caller does not override one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A prompt pair: a system instruction and a user message.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// System-level instructions (tone, required JSON shape, etc).
    pub system: String,
    /// The user-facing content to reason about.
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Capability that takes a [`Prompt`] and returns the model's raw text
/// response. Agents layer JSON parsing and validation on top (see
/// [`crate::json`]) — this trait only knows about text in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a completion request and return the model's text output.
    async fn complete(&self, prompt: Prompt) -> Result<String, LlmError>;
}

/// Client for the Anthropic Messages API.
///
/// Mirrors the provider-client shape used elsewhere in this crate
/// family: a small builder over a shared [`reqwest::Client`], with the
/// API key and default model as the only required state.
pub struct AnthropicLlmClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicLlmClient {
    /// Create a new client with the given API key and sensible
    /// defaults (model `claude-sonnet-4-20250514`, base URL
    /// `https://api.anthropic.com`).
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL — useful for a local mock server in
    /// tests.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl LlmClient for AnthropicLlmClient {
    async fn complete(&self, prompt: Prompt) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": prompt.max_tokens,
            "temperature": prompt.temperature,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
        });

        tracing::debug!(url = %self.messages_url(), model = %self.model, "sending llm completion request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(std::time::Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Provider { status: status.as_u16(), body: text });
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;

        extract_text(&json)
    }
}

/// Pull the concatenated text blocks out of an Anthropic Messages API
/// response body.
fn extract_text(json: &serde_json::Value) -> Result<String, LlmError> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::Malformed("missing content array".to_string()))?;

    let text: String = blocks
        .iter()
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(LlmError::Malformed("empty completion text".to_string()));
    }
    Ok(text)
}
