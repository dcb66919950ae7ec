//! JSON extraction and fallback-driven validation for LLM completions.
//!
//! Models are asked for JSON but routinely wrap it in a markdown code
//! fence, or omit a key the caller depends on. This module strips the
//! fence and shallow-fills missing keys from a fallback, and guarantees
//! [`call_json`] never propagates a parse failure — callers always get
//! back a usable value.

use crate::client::{LlmClient, Prompt};
use crate::error::LlmError;
use serde_json::Value;

/// Strip a leading/trailing markdown code fence (` ```json ` or plain
/// ` ``` `) around a model response, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse `text` as a JSON object, stripping a code fence first.
fn parse_object(text: &str) -> Result<Value, LlmError> {
    let stripped = strip_code_fence(text);
    let value: Value = serde_json::from_str(stripped).map_err(|e| LlmError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(LlmError::Malformed("response is not a JSON object".to_string()));
    }
    Ok(value)
}

/// Fill any of `required_keys` missing from `value` with the
/// corresponding key from `fallback`.
fn fill_missing_keys(mut value: Value, fallback: &Value, required_keys: &[&str]) -> Value {
    let obj = value.as_object_mut().expect("caller guarantees object");
    for key in required_keys {
        if !obj.contains_key(*key) {
            if let Some(default) = fallback.get(key) {
                obj.insert((*key).to_string(), default.clone());
            }
        }
    }
    value
}

/// Call `client` with `prompt`, parse the response as a JSON object,
/// fill any of `required_keys` missing from it using `fallback`, and
/// return the result. On any failure — request error, malformed JSON,
/// non-object response — logs the failure and returns `fallback`
/// untouched. Never returns an `Err`: this is the boundary past which
/// an LLM outage degrades agent behavior instead of propagating.
pub async fn call_json(
    client: &dyn LlmClient,
    prompt: Prompt,
    required_keys: &[&str],
    fallback: Value,
) -> Value {
    match client.complete(prompt).await {
        Ok(text) => match parse_object(&text) {
            Ok(value) => fill_missing_keys(value, &fallback, required_keys),
            Err(err) => {
                tracing::warn!(error = %err, "llm response failed json parsing, using fallback");
                fallback
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "llm completion request failed, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_json_tagged_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn passes_through_bare_json() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn fills_missing_keys_from_fallback() {
        let value = serde_json::json!({"complexity": "low"});
        let fallback = serde_json::json!({"complexity": "medium", "risk": "unknown"});
        let filled = fill_missing_keys(value, &fallback, &["complexity", "risk"]);
        assert_eq!(filled["complexity"], "low");
        assert_eq!(filled["risk"], "unknown");
    }

    #[test]
    fn parse_object_rejects_non_object_json() {
        assert!(parse_object("[1,2,3]").is_err());
    }

    #[test]
    fn parse_object_rejects_garbage() {
        assert!(parse_object("not json at all").is_err());
    }

    struct Failing;

    #[async_trait::async_trait]
    impl LlmClient for Failing {
        async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
            Err(LlmError::Request("connection refused".to_string()))
        }
    }

    struct Fenced(&'static str);

    #[async_trait::async_trait]
    impl LlmClient for Fenced {
        async fn complete(&self, _prompt: Prompt) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn test_prompt() -> Prompt {
        Prompt {
            system: "s".to_string(),
            user: "u".to_string(),
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn call_json_falls_back_on_request_failure() {
        let fallback = serde_json::json!({"complexity": "medium"});
        let result = call_json(&Failing, test_prompt(), &["complexity"], fallback.clone()).await;
        assert_eq!(result, fallback);
    }

    #[tokio::test]
    async fn call_json_parses_fenced_response() {
        let client = Fenced("```json\n{\"complexity\":\"high\"}\n```");
        let fallback = serde_json::json!({"complexity": "medium"});
        let result = call_json(&client, test_prompt(), &["complexity"], fallback).await;
        assert_eq!(result["complexity"], "high");
    }

    #[tokio::test]
    async fn call_json_falls_back_on_malformed_json() {
        let client = Fenced("not json");
        let fallback = serde_json::json!({"complexity": "medium"});
        let result = call_json(&client, test_prompt(), &["complexity"], fallback.clone()).await;
        assert_eq!(result, fallback);
    }
}
