use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::NotificationPusher;
use crate::models::Notification;

pub const SIGNATURE_HEADER: &str = "x-washdesk-signature";

/// POSTs each notification as JSON to a fixed URL, signed with the shared secret.
pub struct WebhookPusher {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookPusher {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

/// base64(HMAC-SHA1(secret, body)). Receivers recompute it over the raw request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing key: {e}"))?;
    mac.update(body);
    let result = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(result))
}

#[async_trait]
impl NotificationPusher for WebhookPusher {
    async fn push(&self, notification: &Notification) -> anyhow::Result<()> {
        let body = serde_json::to_vec(notification)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !self.secret.is_empty() {
            request = request.header(SIGNATURE_HEADER, sign_payload(&self.secret, &body)?);
        }

        request
            .body(body)
            .send()
            .await
            .context("failed to reach notification webhook")?
            .error_for_status()
            .context("notification webhook returned error")?;

        Ok(())
    }
}
