// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group-chat bridge adapter.

use async_trait::async_trait;

use super::http::send_json_with_retry;
use super::{ChannelError, MessageChannel};
use crate::config::GroupChatConfig;

pub struct HttpGroupChatChannel {
    config: GroupChatConfig,
    client: reqwest::Client,
}

impl HttpGroupChatChannel {
    pub fn new(config: GroupChatConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl MessageChannel for HttpGroupChatChannel {
    fn enabled(&self) -> bool {
        self.config.enabled && !self.config.endpoint.is_empty()
    }

    async fn send(&self, address: &str, message: &str) -> Result<(), ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::Disabled);
        }
        let payload = serde_json::json!({
            "message": message,
            "groupId": address,
        });
        let url = format!(
            "{}{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.send_path
        );
        send_json_with_retry(|| self.client.post(&url).json(&payload), "group-chat send").await?;
        Ok(())
    }
}
