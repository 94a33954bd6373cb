// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store: domain model and the repository port.
//!
//! Entities are plain data carriers; nothing here holds a live database
//! handle. A [`Store`] implementation applies each operation inside one
//! transaction where atomicity matters (trigger-create, transitions, policy
//! replacement).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

// -- Enumerations -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    Triggered,
    Acknowledged,
    Resolved,
    Cancelled,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "triggered" => Some(Self::Triggered),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound channel tag carried on escalation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    Ticket,
    Sms,
    GroupChat,
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Sms => "sms",
            Self::GroupChat => "group-chat",
            Self::Webhook => "webhook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ticket" => Some(Self::Ticket),
            "sms" => Some(Self::Sms),
            "group-chat" => Some(Self::GroupChat),
            "webhook" => Some(Self::Webhook),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Manual,
    System,
    Escalation,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::System => "system",
            Self::Escalation => "escalation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "system" => Some(Self::System),
            "escalation" => Some(Self::Escalation),
            _ => None,
        }
    }
}

/// Result tag on an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchResult {
    Ok,
    Error,
    Timeout,
    Unknown,
}

impl DispatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "error" => Some(Self::Error),
            "timeout" => Some(Self::Timeout),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

// -- Entities -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub site_id: String,
    pub label: String,
    pub floor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub display_name: String,
    pub role: Option<String>,
    pub phone_mobile: Option<String>,
    pub phone_ext: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub vendor: String,
    pub model_family: String,
    pub mac: Option<String>,
    pub account_ext: Option<String>,
    pub device_token: String,
    pub person_id: Option<String>,
    pub room_id: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Device {
    /// A device may trigger only when both bindings are present.
    pub fn is_bound(&self) -> bool {
        self.person_id.is_some() && self.room_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTarget {
    pub id: String,
    pub label: String,
    pub channel: ChannelKind,
    pub address: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: String,
    pub name: String,
}

/// Composite (policy, step_no, target) with a delay in seconds. Step 0 is
/// the immediate fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationStep {
    pub policy_id: String,
    pub step_no: i32,
    pub after_seconds: i64,
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub status: AlarmStatus,
    pub source: String,
    pub event: String,
    pub created_at: DateTime<Utc>,
    pub person_id: Option<String>,
    pub room_id: Option<String>,
    pub site_id: Option<String>,
    pub device_id: Option<String>,
    pub severity: String,
    pub silent: bool,
    pub ticket_id: Option<i64>,
    pub ack_token: Option<String>,
    pub acked_at: Option<DateTime<Utc>>,
    pub acked_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub meta: serde_json::Value,
}

impl Alarm {
    /// Merge a key into the meta bag. Existing fields are never dropped.
    pub fn merge_meta(&mut self, key: &str, value: serde_json::Value) {
        if !self.meta.is_object() {
            self.meta = serde_json::json!({});
        }
        if let Some(map) = self.meta.as_object_mut() {
            map.insert(key.to_owned(), value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmNote {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub note: String,
    pub note_type: NoteType,
}

/// Append-only audit row: one outbound attempt on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmNotification {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub channel: ChannelKind,
    pub target_id: Option<String>,
    pub payload: serde_json::Value,
    pub result: DispatchResult,
    pub error: Option<String>,
}

// -- Listing ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    Status,
    Severity,
}

impl Default for SortField {
    fn default() -> Self {
        Self::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

/// Filter, sort, and cursor surface for alarm listing and export.
#[derive(Debug, Clone, Default)]
pub struct AlarmQuery {
    pub status: Option<AlarmStatus>,
    pub severity: Option<String>,
    pub person_id: Option<String>,
    pub room_id: Option<String>,
    pub site_id: Option<String>,
    pub device_id: Option<String>,
    pub source: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: usize,
    pub cursor: Option<Uuid>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlarmStats {
    pub total: u64,
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub by_severity: std::collections::BTreeMap<String, u64>,
}

// -- Port ---------------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
    // Sites / rooms / persons
    async fn upsert_site(&self, site: &Site) -> Result<(), StoreError>;
    async fn get_site(&self, id: &str) -> Result<Option<Site>, StoreError>;
    async fn upsert_room(&self, room: &Room) -> Result<(), StoreError>;
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError>;
    async fn upsert_person(&self, person: &Person) -> Result<(), StoreError>;
    async fn get_person(&self, id: &str) -> Result<Option<Person>, StoreError>;

    // Devices (keyed by device_token for upsert)
    async fn upsert_device(&self, device: &Device) -> Result<Device, StoreError>;
    async fn get_device_by_token(&self, token: &str) -> Result<Option<Device>, StoreError>;

    // Escalation config
    async fn upsert_target(&self, target: &EscalationTarget) -> Result<(), StoreError>;
    async fn get_target(&self, id: &str) -> Result<Option<EscalationTarget>, StoreError>;
    async fn upsert_policy(&self, policy: &EscalationPolicy) -> Result<(), StoreError>;
    /// Replace every step of one policy in a single transaction.
    async fn replace_policy_steps(
        &self,
        policy_id: &str,
        steps: &[EscalationStep],
    ) -> Result<(), StoreError>;
    /// Steps of one ordinal joined with their targets.
    async fn steps_with_targets(
        &self,
        policy_id: &str,
        step_no: i32,
    ) -> Result<Vec<(EscalationStep, EscalationTarget)>, StoreError>;
    /// Distinct (step_no, after_seconds) pairs with step_no > 0.
    async fn deferred_steps(&self, policy_id: &str) -> Result<Vec<(i32, i64)>, StoreError>;
    /// Subset of `ids` that exist as targets.
    async fn existing_target_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError>;

    // Alarms
    /// Insert the alarm and stamp the owning device's last_seen in one
    /// transaction.
    async fn create_alarm(&self, alarm: &Alarm) -> Result<(), StoreError>;
    async fn get_alarm(&self, id: Uuid) -> Result<Option<Alarm>, StoreError>;
    async fn get_alarms(&self, ids: &[Uuid]) -> Result<Vec<Alarm>, StoreError>;
    async fn get_alarm_by_ack_token(&self, token: &str) -> Result<Option<Alarm>, StoreError>;
    /// Full-row write; the single UPDATE is what makes (status, timestamp,
    /// actor) transitions atomic.
    async fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError>;
    async fn set_ticket_id(&self, alarm_id: Uuid, ticket_id: i64) -> Result<(), StoreError>;
    /// Up to `limit + 1` rows so the caller can decide whether a next
    /// cursor exists.
    async fn list_alarms(&self, query: &AlarmQuery) -> Result<Vec<Alarm>, StoreError>;
    async fn alarm_stats(&self) -> Result<AlarmStats, StoreError>;

    // Notes + notifications (append-only)
    async fn insert_note(&self, note: &AlarmNote) -> Result<(), StoreError>;
    async fn list_notes(&self, alarm_id: Uuid) -> Result<Vec<AlarmNote>, StoreError>;
    async fn insert_notification(&self, row: &AlarmNotification) -> Result<(), StoreError>;
    async fn list_notifications(&self, alarm_id: Uuid)
        -> Result<Vec<AlarmNotification>, StoreError>;

    /// Liveness probe for /readyz.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
