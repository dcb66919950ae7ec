//! `DesignTool` over the Figma REST API, plus HMAC-SHA256 webhook
//! signature verification.

use crate::error::{map_reqwest_error, map_status, AdapterError};
use crate::traits::{DesignComponent, DesignFile, DesignTool};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

/// `DesignTool` backed by a Figma file.
pub struct FigmaDesignTool {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl FigmaDesignTool {
    /// `base_url` defaults to `https://api.figma.com` in production; a
    /// mock server can override it for tests. `token` is a personal
    /// access token sent as `X-Figma-Token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), token: token.into(), client: reqwest::Client::new() }
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-Figma-Token", &self.token)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &url))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, &url))?;
        if !status.is_success() {
            return Err(map_status(status, &text, &url));
        }
        serde_json::from_str(&text).map_err(|e| AdapterError::Rejected(format!("{url}: {e}")))
    }
}

#[async_trait]
impl DesignTool for FigmaDesignTool {
    async fn get_file(&self, file_key: &str) -> Result<DesignFile, AdapterError> {
        let json = self.get(&format!("/v1/files/{file_key}")).await?;
        Ok(DesignFile {
            key: file_key.to_string(),
            name: json.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            last_modified: json.get("lastModified").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
    }

    async fn get_components(&self, file_key: &str) -> Result<Vec<DesignComponent>, AdapterError> {
        let json = self.get(&format!("/v1/files/{file_key}/components")).await?;
        let components = json
            .get("meta")
            .and_then(|m| m.get("components"))
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| {
                Some(DesignComponent {
                    key: c.get("key")?.as_str()?.to_string(),
                    name: c.get("name")?.as_str()?.to_string(),
                })
            })
            .collect();
        Ok(components)
    }
}

/// Verify a Figma `FILE_UPDATE` webhook's HMAC-SHA256 signature against
/// the shared `design_webhook_secret` (§6.1, §6.4). `signature` is the
/// lowercase-hex value of the `X-Figma-Signature` header.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let Ok(provided) = hex_decode(signature) else {
        return false;
    };
    expected.as_slice() == provided.as_slice()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_webhook_signature_accepts_matching_hmac() {
        let secret = "shh";
        let body = b"{\"event_type\":\"FILE_UPDATE\"}";
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = hex_encode(&mac.finalize().into_bytes());
        assert!(verify_webhook_signature(secret, body, &signature));
    }

    #[test]
    fn verify_webhook_signature_rejects_wrong_secret() {
        let body = b"payload";
        let mut mac = Hmac::<Sha256>::new_from_slice(b"right").unwrap();
        mac.update(body);
        let signature = hex_encode(&mac.finalize().into_bytes());
        assert!(!verify_webhook_signature("wrong", body, &signature));
    }

    #[test]
    fn verify_webhook_signature_rejects_malformed_hex() {
        assert!(!verify_webhook_signature("secret", b"body", "not-hex"));
    }

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
