// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook callback adapter.
//!
//! One HTTP attempt per call; the escalation handler owns the retry loop so
//! each attempt gets its own audit row. Requests are signed with the shared
//! secret when one is configured.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{ChannelError, WebhookChannel};
use crate::clock::hex_encode;
use crate::config::WebhookConfig;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// sha256 over `secret.body`, hex encoded and prefixed with the scheme.
pub fn sign(secret: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(body.as_bytes());
    format!("sha256={}", hex_encode(&hasher.finalize()))
}

pub struct HttpWebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl HttpWebhookChannel {
    pub fn new(config: WebhookConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl WebhookChannel for HttpWebhookChannel {
    fn enabled(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    async fn post_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::Disabled);
        }
        let raw = body.to_string();
        let mut req = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(raw.clone());
        if !self.config.secret.is_empty() {
            req = req.header(SIGNATURE_HEADER, sign(&self.config.secret, &raw));
        }
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ChannelError::Timeout(e.to_string())
            } else {
                ChannelError::Http(e.to_string())
            }
        })?;
        resp.error_for_status().map_err(|e| ChannelError::Http(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
