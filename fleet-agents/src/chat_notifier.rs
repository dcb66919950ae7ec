//! Chat Notifier Agent (§4.13).

use async_trait::async_trait;
use fleet_adapters::traits::ChatService;
use fleet_core::agent::{Agent, AgentContext};
use fleet_core::error::AgentError;
use fleet_core::event::{Event, EventKind};
use fleet_stores::credentials::{CredentialStore, ServiceKind};
use std::sync::Arc;

/// On `chat_notification`: resolves a chat credential and sends the
/// message. Never republishes on failure, only logs — this is the
/// fleet's terminal, outbound-only agent.
pub struct ChatNotifierAgent {
    chat: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
    environment_default_channel: String,
    kinds: Vec<EventKind>,
}

impl ChatNotifierAgent {
    /// `environment_default_channel` backs §6.4's `chat_default_channel`
    /// config key, the last resort when neither the event payload nor
    /// the resolved credential names a channel.
    pub fn new(chat: Arc<dyn ChatService>, credentials: Arc<dyn CredentialStore>, environment_default_channel: impl Into<String>) -> Self {
        Self {
            chat,
            credentials,
            environment_default_channel: environment_default_channel.into(),
            kinds: vec![EventKind::ChatNotification],
        }
    }

    async fn resolve_credential(&self, project: Option<i64>) -> Option<fleet_stores::credentials::ServiceCredential> {
        if let Some(credential) = self.credentials.get(project, ServiceKind::ChatService).await {
            if credential.enabled {
                return Some(credential);
            }
        }
        self.credentials
            .list_for_service(ServiceKind::ChatService)
            .await
            .into_iter()
            .find(|(proj, cred)| proj.is_none() && cred.enabled)
            .map(|(_, cred)| cred)
    }

    fn resolve_channel(&self, payload: &serde_json::Value, credential: Option<&fleet_stores::credentials::ServiceCredential>) -> String {
        if let Some(channel) = payload.get("channel").and_then(|v| v.as_str()) {
            return channel.to_string();
        }
        if let Some(channel) =
            credential.and_then(|c| c.config.get("default_channel")).and_then(|v| v.as_str())
        {
            return channel.to_string();
        }
        self.environment_default_channel.clone()
    }
}

#[async_trait]
impl Agent for ChatNotifierAgent {
    fn name(&self) -> &str {
        "chat_notifier"
    }

    fn description(&self) -> &str {
        "Sends chat_notification events to the resolved chat service"
    }

    fn subscribed_kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    async fn handle(&self, event: &Event, _ctx: &AgentContext) -> Result<(), AgentError> {
        let text = event.payload.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        if text.is_empty() {
            return Ok(());
        }

        let credential = self.resolve_credential(event.project_scope).await;
        let channel = self.resolve_channel(&event.payload, credential.as_ref());

        if let Err(err) = self.chat.post_message(&channel, text).await {
            tracing::warn!(channel, error = %err, "failed to send chat notification");
        }

        Ok(())
    }
}
