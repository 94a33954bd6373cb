// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound channel ports and their bindings.
//!
//! The orchestrator only ever talks to these traits; whether they reach a
//! real vendor or the in-memory simulation hub is decided once at startup.

pub mod chat;
pub mod http;
pub mod mock;
pub mod sms;
pub mod ticket;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::BrokerConfig;

pub use mock::{MockHub, MockNotification};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is not enabled")]
    Disabled,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Http(String),
    #[error("malformed response: {0}")]
    BadResponse(String),
}

impl ChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Outbound contract for ticket creation.
#[derive(Debug, Clone, Serialize)]
pub struct TicketRequest {
    pub title: String,
    pub group: String,
    pub priority: u8,
    pub customer: String,
    pub tags: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait TicketChannel: Send + Sync {
    fn enabled(&self) -> bool;
    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<i64, ChannelError>;
    async fn add_internal_note(
        &self,
        ticket_id: i64,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError>;
}

/// Plain-text message delivery (SMS and group chat).
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn enabled(&self) -> bool;
    async fn send(&self, address: &str, message: &str) -> Result<(), ChannelError>;
}

/// State-changed callback delivery. One attempt per call; the caller owns
/// the retry loop so every attempt lands in the audit log.
#[async_trait]
pub trait WebhookChannel: Send + Sync {
    fn enabled(&self) -> bool;
    fn max_retries(&self) -> u32;
    async fn post_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), ChannelError>;
}

/// The bound adapter set handed to the orchestrator.
#[derive(Clone)]
pub struct Channels {
    pub ticket: Arc<dyn TicketChannel>,
    pub sms: Arc<dyn MessageChannel>,
    pub group_chat: Arc<dyn MessageChannel>,
    pub webhook: Arc<dyn WebhookChannel>,
    /// Present only in simulation mode.
    pub hub: Option<Arc<MockHub>>,
}

impl Channels {
    /// Bind real HTTP adapters from configuration.
    pub fn from_config(config: &BrokerConfig, client: reqwest::Client) -> Self {
        Self {
            ticket: Arc::new(ticket::HttpTicketChannel::new(config.ticket(), client.clone())),
            sms: Arc::new(sms::HttpSmsChannel::new(config.sms(), client.clone())),
            group_chat: Arc::new(chat::HttpGroupChatChannel::new(
                config.group_chat(),
                client.clone(),
            )),
            webhook: Arc::new(webhook::HttpWebhookChannel::new(config.webhook(), client)),
            hub: None,
        }
    }

    /// Bind every adapter to the in-memory hub (simulation mode).
    pub fn simulated(config: &BrokerConfig) -> Self {
        let hub = Arc::new(MockHub::new());
        Self {
            ticket: Arc::new(mock::MockTicketChannel::new(hub.clone())),
            sms: Arc::new(mock::MockMessageChannel::new(hub.clone(), "sms")),
            group_chat: Arc::new(mock::MockMessageChannel::new(hub.clone(), "group-chat")),
            webhook: Arc::new(mock::MockWebhookChannel::new(
                hub.clone(),
                config.webhook().max_retries,
            )),
            hub: Some(hub),
        }
    }
}
