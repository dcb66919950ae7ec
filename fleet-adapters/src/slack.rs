//! `ChatService` over the Slack Web API.

use crate::error::{map_reqwest_error, AdapterError};
use crate::traits::ChatService;
use async_trait::async_trait;
use std::time::Duration;

/// `ChatService` backed by a Slack bot token.
pub struct SlackChatService {
    token: String,
    client: reqwest::Client,
}

impl SlackChatService {
    /// `token` is a bot token (`xoxb-...`) with `chat:write` scope.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ChatService for SlackChatService {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), AdapterError> {
        let body = serde_json::json!({"channel": channel, "text": text});
        tracing::debug!(channel, "posting slack message");
        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token)
            .json(&body)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "post_message"))?;
        let status = response.status();
        let text_body = response.text().await.map_err(|e| map_reqwest_error(e, "post_message"))?;
        if !status.is_success() {
            return Err(crate::error::map_status(status, &text_body, "post_message"));
        }
        // Slack returns HTTP 200 even for application-level failures.
        let json: serde_json::Value =
            serde_json::from_str(&text_body).map_err(|e| AdapterError::Rejected(e.to_string()))?;
        if json.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = json.get("error").and_then(|v| v.as_str()).unwrap_or("unknown_error");
            return Err(AdapterError::Rejected(format!("slack: {error}")));
        }
        Ok(())
    }
}
