// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SMS provider adapter.

use async_trait::async_trait;

use super::http::send_json_with_retry;
use super::{ChannelError, MessageChannel};
use crate::config::SmsConfig;

pub struct HttpSmsChannel {
    config: SmsConfig,
    client: reqwest::Client,
}

impl HttpSmsChannel {
    pub fn new(config: SmsConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl MessageChannel for HttpSmsChannel {
    fn enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.is_empty() && !self.config.base_url.is_empty()
    }

    async fn send(&self, address: &str, message: &str) -> Result<(), ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::Disabled);
        }
        let payload = serde_json::json!({
            "to": address,
            "message": message,
            "from": self.config.from,
        });
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.send_path
        );
        send_json_with_retry(
            || self.client.post(&url).bearer_auth(&self.config.api_key).json(&payload),
            "sms send",
        )
        .await?;
        Ok(())
    }
}
