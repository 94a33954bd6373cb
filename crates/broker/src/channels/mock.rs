// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulation-mode channel bindings.
//!
//! Every dispatch lands in a bounded, process-wide hub that the simulation
//! API exposes for demos and end-to-end tests. The hub has an explicit
//! clear lifecycle; when it overflows, the oldest entries fall off.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ChannelError, MessageChannel, TicketChannel, TicketRequest, WebhookChannel};

const HUB_CAPACITY: usize = 256;
const FIRST_TICKET_ID: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct MockNotification {
    pub id: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct MockHub {
    notifications: Mutex<VecDeque<MockNotification>>,
    ticket_counter: AtomicI64,
    sequence: AtomicI64,
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHub {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(VecDeque::with_capacity(HUB_CAPACITY)),
            ticket_counter: AtomicI64::new(FIRST_TICKET_ID),
            sequence: AtomicI64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MockNotification>> {
        match self.notifications.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, channel: &str, payload: serde_json::Value) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let mut notifications = self.lock();
        if notifications.len() == HUB_CAPACITY {
            notifications.pop_front();
        }
        notifications.push_back(MockNotification {
            id: format!("mock-{seq}"),
            channel: channel.to_owned(),
            timestamp: Utc::now(),
            payload,
            result: "ok".to_owned(),
            error: None,
        });
    }

    pub fn all(&self) -> Vec<MockNotification> {
        self.lock().iter().cloned().collect()
    }

    pub fn by_channel(&self, channel: &str) -> Vec<MockNotification> {
        self.lock().iter().filter(|n| n.channel == channel).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.ticket_counter.store(FIRST_TICKET_ID, Ordering::Relaxed);
        tracing::info!("simulation notifications cleared");
    }

    pub fn next_ticket_id(&self) -> i64 {
        self.ticket_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct MockTicketChannel {
    hub: Arc<MockHub>,
}

impl MockTicketChannel {
    pub fn new(hub: Arc<MockHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl TicketChannel for MockTicketChannel {
    fn enabled(&self) -> bool {
        true
    }

    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<i64, ChannelError> {
        let ticket_id = self.hub.next_ticket_id();
        self.hub.record(
            "ticket",
            serde_json::json!({
                "action": "create_ticket",
                "ticket_id": ticket_id,
                "title": ticket.title,
                "body": ticket.body,
                "tags": ticket.tags,
            }),
        );
        Ok(ticket_id)
    }

    async fn add_internal_note(
        &self,
        ticket_id: i64,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        self.hub.record(
            "ticket",
            serde_json::json!({
                "action": "internal_note",
                "ticket_id": ticket_id,
                "subject": subject,
                "body": body,
            }),
        );
        Ok(())
    }
}

pub struct MockMessageChannel {
    hub: Arc<MockHub>,
    channel: &'static str,
}

impl MockMessageChannel {
    pub fn new(hub: Arc<MockHub>, channel: &'static str) -> Self {
        Self { hub, channel }
    }
}

#[async_trait]
impl MessageChannel for MockMessageChannel {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, address: &str, message: &str) -> Result<(), ChannelError> {
        self.hub.record(
            self.channel,
            serde_json::json!({"to": address, "message": message}),
        );
        Ok(())
    }
}

pub struct MockWebhookChannel {
    hub: Arc<MockHub>,
    max_retries: u32,
}

impl MockWebhookChannel {
    pub fn new(hub: Arc<MockHub>, max_retries: u32) -> Self {
        Self { hub, max_retries }
    }
}

#[async_trait]
impl WebhookChannel for MockWebhookChannel {
    fn enabled(&self) -> bool {
        true
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    async fn post_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        self.hub.record("webhook", serde_json::json!({"url": url, "body": body}));
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
