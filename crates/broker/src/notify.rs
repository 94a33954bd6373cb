// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification orchestrator: builds the per-step payload once, dispatches
//! it to every enabled target, and writes one audit row per attempt.
//!
//! Failure isolation is strict: one channel blowing up never stops the next
//! target in the same step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::channels::{
    ChannelError, MessageChannel, TicketChannel, TicketRequest, WebhookChannel,
};
use crate::clock::Clock;
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::state::AppState;
use crate::store::{Alarm, AlarmNotification, ChannelKind, DispatchResult, Store};

pub const DEFAULT_POLICY: &str = "default";
pub const TAG_EMERGENCY: &str = "emergency";
pub const TAG_SILENT: &str = "silent";

/// Display names resolved from the alarm's bindings; a missing FK falls
/// back to the raw id string.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub person_name: String,
    pub room_label: String,
    pub site_name: Option<String>,
}

pub async fn enrich(store: &dyn Store, alarm: &Alarm) -> Result<Enriched, BrokerError> {
    let mut person_name = alarm.person_id.clone().unwrap_or_else(|| "-".to_owned());
    let mut room_label = alarm.room_id.clone().unwrap_or_else(|| "-".to_owned());
    let mut site_name = alarm.site_id.clone();

    if let Some(ref person_id) = alarm.person_id {
        if let Some(person) = store.get_person(person_id).await? {
            person_name = person.display_name;
        }
    }
    if let Some(ref room_id) = alarm.room_id {
        if let Some(room) = store.get_room(room_id).await? {
            room_label = room.label;
            site_name = Some(match store.get_site(&room.site_id).await? {
                Some(site) => site.name,
                None => room.site_id,
            });
        }
    }
    Ok(Enriched { person_name, room_label, site_name })
}

/// Severity-derived channel priority.
pub fn severity_priority(severity: &str) -> u8 {
    match severity {
        "P0" => 3,
        "P1" | "P2" => 2,
        "P3" => 1,
        _ => 2,
    }
}

/// The canonical text block shared by every channel.
pub fn format_alarm_message(
    alarm_id: &Uuid,
    person: &str,
    room: &str,
    site: Option<&str>,
    created_at: DateTime<Utc>,
    ack_url: &str,
    step_no: i32,
) -> String {
    let location = match site {
        Some(site) => format!("{room} / {site}"),
        None => room.to_owned(),
    };
    [
        "EMERGENCY ALARM (silent)".to_owned(),
        format!("Alarm id: {alarm_id}"),
        format!("Person: {person}"),
        format!("Location: {location}"),
        format!("Time: {}", created_at.to_rfc3339()),
        format!("Stage: {step_no}"),
        format!("Acknowledge: {ack_url}"),
    ]
    .join("\n")
}

/// Per-step notification payload, constructed once and reused for every
/// target in the step.
#[derive(Debug, Clone, Serialize)]
pub struct StepPayload {
    pub alarm_id: Uuid,
    pub step_no: i32,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub priority: u8,
}

pub fn build_payload(
    alarm: &Alarm,
    enriched: &Enriched,
    step_no: i32,
    ack_url: &str,
) -> StepPayload {
    let title = if step_no == 0 {
        format!("EMERGENCY ALARM – {} – {}", enriched.person_name, enriched.room_label)
    } else {
        format!(
            "ESCALATION stage {step_no} – {} – {}",
            enriched.person_name, enriched.room_label
        )
    };
    let mut tags = Vec::new();
    if step_no == 0 {
        tags.push(TAG_EMERGENCY.to_owned());
    }
    if alarm.severity == "P0" {
        tags.push(TAG_SILENT.to_owned());
    }
    let body = format_alarm_message(
        &alarm.id,
        &enriched.person_name,
        &enriched.room_label,
        enriched.site_name.as_deref(),
        alarm.created_at,
        ack_url,
        step_no,
    );
    StepPayload {
        alarm_id: alarm.id,
        step_no,
        title,
        body,
        tags,
        priority: severity_priority(&alarm.severity),
    }
}

fn audit_payload(payload: &StepPayload) -> serde_json::Value {
    serde_json::json!({
        "step_no": payload.step_no,
        "title": payload.title,
        "priority": payload.priority,
        "tags": payload.tags,
    })
}

fn classify(err: &ChannelError) -> DispatchResult {
    if err.is_timeout() {
        DispatchResult::Timeout
    } else {
        DispatchResult::Error
    }
}

pub struct Notifier<'a> {
    state: &'a AppState,
}

impl<'a> Notifier<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Append an audit row. A failed audit write is logged but never
    /// interrupts dispatch.
    pub async fn log_notification(
        &self,
        alarm_id: Uuid,
        channel: ChannelKind,
        target_id: Option<&str>,
        payload: serde_json::Value,
        result: DispatchResult,
        error: Option<String>,
    ) {
        let row = AlarmNotification {
            id: Uuid::new_v4(),
            alarm_id,
            created_at: self.state.clock.now(),
            channel,
            target_id: target_id.map(str::to_owned),
            payload,
            result,
            error,
        };
        if let Err(e) = self.state.store.insert_notification(&row).await {
            tracing::error!(alarm_id = %alarm_id, err = %e, "writing notification audit row failed");
        }
    }

    /// Create an external ticket for a fresh alarm. Returns the ticket id,
    /// or `None` when the channel is disabled or the create failed.
    pub async fn create_ticket(&self, alarm: &Alarm, payload: &StepPayload) -> Option<i64> {
        let channels = &self.state.channels;
        if !channels.ticket.enabled() {
            return None;
        }
        let request = TicketRequest {
            title: payload.title.clone(),
            group: self.state.config.ticket_group.clone(),
            priority: payload.priority,
            customer: self.state.config.ticket_customer.clone(),
            tags: payload.tags.clone(),
            subject: "Alarm raised (silent)".to_owned(),
            body: payload.body.clone(),
        };
        match channels.ticket.create_ticket(&request).await {
            Ok(ticket_id) => {
                Metrics::incr(&self.state.metrics.notifications_sent);
                self.log_notification(
                    alarm.id,
                    ChannelKind::Ticket,
                    None,
                    serde_json::json!({"action": "create_ticket", "ticket_id": ticket_id}),
                    DispatchResult::Ok,
                    None,
                )
                .await;
                Some(ticket_id)
            }
            Err(e) => {
                Metrics::incr(&self.state.metrics.notifications_failed);
                tracing::error!(alarm_id = %alarm.id, err = %e, "ticket creation failed");
                self.log_notification(
                    alarm.id,
                    ChannelKind::Ticket,
                    None,
                    serde_json::json!({"action": "create_ticket"}),
                    classify(&e),
                    Some(e.to_string()),
                )
                .await;
                None
            }
        }
    }

    /// Dispatch one escalation step to every enabled target. Each attempt
    /// gets exactly one audit row; failures never propagate to the caller.
    pub async fn dispatch_step(
        &self,
        alarm: &Alarm,
        payload: &StepPayload,
    ) -> Result<(), BrokerError> {
        let steps = self
            .state
            .store
            .steps_with_targets(DEFAULT_POLICY, payload.step_no)
            .await?;

        for (_, target) in steps {
            if !target.enabled {
                continue;
            }
            let outcome = self.deliver(alarm, &target.channel, &target.address, payload).await;
            match outcome {
                Ok(()) => {
                    Metrics::incr(&self.state.metrics.notifications_sent);
                    self.log_notification(
                        alarm.id,
                        target.channel,
                        Some(&target.id),
                        audit_payload(payload),
                        DispatchResult::Ok,
                        None,
                    )
                    .await;
                }
                Err(e) => {
                    Metrics::incr(&self.state.metrics.notifications_failed);
                    tracing::error!(
                        alarm_id = %alarm.id,
                        channel = %target.channel,
                        target_id = %target.id,
                        step_no = payload.step_no,
                        err = %e,
                        "notification dispatch failed"
                    );
                    self.log_notification(
                        alarm.id,
                        target.channel,
                        Some(&target.id),
                        audit_payload(payload),
                        classify(&e),
                        Some(e.to_string()),
                    )
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn deliver(
        &self,
        alarm: &Alarm,
        channel: &ChannelKind,
        address: &str,
        payload: &StepPayload,
    ) -> Result<(), ChannelError> {
        let channels = &self.state.channels;
        match channel {
            ChannelKind::Sms => channels.sms.send(address, &payload.body).await,
            ChannelKind::GroupChat => channels.group_chat.send(address, &payload.body).await,
            ChannelKind::Ticket => match alarm.ticket_id {
                // A ticket target at a later step adds to the existing
                // ticket rather than opening a second one.
                Some(ticket_id) => {
                    channels
                        .ticket
                        .add_internal_note(ticket_id, &payload.title, &payload.body)
                        .await
                }
                None => {
                    channels
                        .ticket
                        .create_ticket(&TicketRequest {
                            title: payload.title.clone(),
                            group: self.state.config.ticket_group.clone(),
                            priority: payload.priority,
                            customer: self.state.config.ticket_customer.clone(),
                            tags: payload.tags.clone(),
                            subject: "Alarm raised (silent)".to_owned(),
                            body: payload.body.clone(),
                        })
                        .await
                        .map(|_| ())
                }
            },
            ChannelKind::Webhook => {
                let body = serde_json::to_value(payload)
                    .unwrap_or_else(|_| serde_json::json!({"alarm_id": payload.alarm_id}));
                channels.webhook.post_once(address, &body).await
            }
        }
    }

    /// Acknowledgment follow-up: an internal note on the recorded ticket.
    pub async fn ticket_ack_note(
        &self,
        alarm: &Alarm,
        ticket_id: i64,
        acked_by: Option<&str>,
        acked_at: DateTime<Utc>,
        note: Option<&str>,
    ) -> bool {
        let channels = &self.state.channels;
        if !channels.ticket.enabled() {
            return false;
        }
        let mut lines = vec![
            format!("Acknowledged by: {}", acked_by.unwrap_or("-")),
            format!("At: {}", acked_at.to_rfc3339()),
        ];
        if let Some(note) = note {
            lines.push(format!("Note: {note}"));
        }
        match channels
            .ticket
            .add_internal_note(ticket_id, "Alarm acknowledged", &lines.join("\n"))
            .await
        {
            Ok(()) => {
                self.log_notification(
                    alarm.id,
                    ChannelKind::Ticket,
                    None,
                    serde_json::json!({"action": "ack_update", "ticket_id": ticket_id}),
                    DispatchResult::Ok,
                    None,
                )
                .await;
                true
            }
            Err(e) => {
                tracing::error!(
                    alarm_id = %alarm.id,
                    ticket_id,
                    err = %e,
                    "ticket ack note failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
