use crate::traits::HookHandler;
use anyhow::Result;
use async_trait::async_trait;
use domain::HookEvent;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

pub const SIGNATURE_HEADER: &str = "X-Threadmod-Signature";

/// Hex HMAC-SHA256 of the request body.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// POSTs every event as JSON to a configured URL.
pub struct WebhookHandler {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookHandler {
    pub fn new(url: String, secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url,
            secret,
        })
    }
}

#[async_trait]
impl HookHandler for WebhookHandler {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn handle(&self, event: &HookEvent) -> Result<()> {
        let body = serde_json::to_vec(event)?;
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_body(secret, &body)?);
        }

        let status = request.body(body).send().await?.error_for_status()?.status();
        debug!(event = event.name(), %status, "webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign_body("key", b"{\"type\":\"comment_approved\"}").unwrap();
        let b = sign_body("key", b"{\"type\":\"comment_approved\"}").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, sign_body("other", b"{\"type\":\"comment_approved\"}").unwrap());
    }
}
