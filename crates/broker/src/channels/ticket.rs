// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket-system adapter: ticket creation and internal follow-up notes.

use async_trait::async_trait;

use super::http::send_json_with_retry;
use super::{ChannelError, TicketChannel, TicketRequest};
use crate::config::TicketConfig;

pub struct HttpTicketChannel {
    config: TicketConfig,
    client: reqwest::Client,
}

impl HttpTicketChannel {
    pub fn new(config: TicketConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl TicketChannel for HttpTicketChannel {
    fn enabled(&self) -> bool {
        !self.config.api_token.is_empty() && !self.config.base_url.is_empty()
    }

    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<i64, ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::Disabled);
        }
        let payload = serde_json::json!({
            "title": ticket.title,
            "group": self.config.group,
            "priority_id": ticket.priority,
            "customer_id": self.config.customer,
            "tags": ticket.tags,
            "article": {
                "subject": ticket.subject,
                "body": ticket.body,
                "type": "note",
                "internal": true,
            },
        });
        let url = self.url("/api/v1/tickets");
        let resp = send_json_with_retry(
            || self.client.post(&url).bearer_auth(&self.config.api_token).json(&payload),
            "ticket create",
        )
        .await?;
        let body: serde_json::Value =
            resp.json().await.map_err(|e| ChannelError::BadResponse(e.to_string()))?;
        body.get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| ChannelError::BadResponse("response missing ticket id".to_owned()))
    }

    async fn add_internal_note(
        &self,
        ticket_id: i64,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::Disabled);
        }
        let payload = serde_json::json!({
            "article": {
                "subject": subject,
                "body": body,
                "type": "note",
                "internal": true,
            },
        });
        let url = self.url(&format!("/api/v1/tickets/{ticket_id}"));
        send_json_with_retry(
            || self.client.put(&url).bearer_auth(&self.config.api_token).json(&payload),
            "ticket note",
        )
        .await?;
        Ok(())
    }
}
