// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation job handlers.
//!
//! Deferred steps are idempotent by construction: each execution re-reads
//! the alarm and dispatches only while it is still TRIGGERED, so a job that
//! fires after acknowledgment is silent.

use std::time::Duration;

use uuid::Uuid;

use crate::channels::WebhookChannel;
use crate::clock::Clock;
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::notify::{build_payload, enrich, Notifier, DEFAULT_POLICY};
use crate::queue::{Job, Queue};
use crate::state::AppState;
use crate::store::{AlarmStatus, ChannelKind, DispatchResult, Store};

/// Handle the "created" event: enrich, open a ticket, fan out step 0, and
/// schedule the deferred steps.
pub async fn alarm_created(state: &AppState, alarm_id: Uuid) -> Result<(), BrokerError> {
    let Some(mut alarm) = state.store.get_alarm(alarm_id).await? else {
        tracing::warn!(alarm_id = %alarm_id, "created event for unknown alarm");
        return Ok(());
    };
    if alarm.status != AlarmStatus::Triggered {
        tracing::info!(alarm_id = %alarm_id, status = %alarm.status, "skipping fan-out, alarm already handled");
        return Ok(());
    }

    let enriched = enrich(&*state.store, &alarm).await?;
    let ack_url = state.config.ack_url(alarm.ack_token.as_deref().unwrap_or_default());
    let payload = build_payload(&alarm, &enriched, 0, &ack_url);

    let notifier = Notifier::new(state);
    if let Some(ticket_id) = notifier.create_ticket(&alarm, &payload).await {
        state.store.set_ticket_id(alarm.id, ticket_id).await?;
        alarm.ticket_id = Some(ticket_id);
    }

    notifier.dispatch_step(&alarm, &payload).await?;

    for (step_no, after_seconds) in state.store.deferred_steps(DEFAULT_POLICY).await? {
        let delay = Duration::from_secs(after_seconds.max(0) as u64);
        state
            .queue
            .enqueue_after(Job::Escalate { alarm_id: alarm.id, step_no }, delay)
            .await?;
        tracing::info!(
            alarm_id = %alarm.id,
            step_no,
            after_seconds,
            "escalation step scheduled"
        );
    }
    Ok(())
}

/// Execute one deferred escalation step, guarded on the alarm still being
/// TRIGGERED.
pub async fn escalate(state: &AppState, alarm_id: Uuid, step_no: i32) -> Result<(), BrokerError> {
    let Some(alarm) = state.store.get_alarm(alarm_id).await? else {
        tracing::warn!(alarm_id = %alarm_id, step_no, "escalation for unknown alarm");
        return Ok(());
    };
    if alarm.status != AlarmStatus::Triggered {
        Metrics::incr(&state.metrics.escalations_skipped);
        tracing::info!(
            alarm_id = %alarm_id,
            step_no,
            status = %alarm.status,
            "escalation skipped"
        );
        return Ok(());
    }

    let enriched = enrich(&*state.store, &alarm).await?;
    let ack_url = state.config.ack_url(alarm.ack_token.as_deref().unwrap_or_default());
    let payload = build_payload(&alarm, &enriched, step_no, &ack_url);

    Notifier::new(state).dispatch_step(&alarm, &payload).await?;
    tracing::info!(alarm_id = %alarm_id, step_no, "escalation step dispatched");
    Ok(())
}

/// Handle the "acked" event: add a follow-up note on the external ticket.
pub async fn alarm_acked(
    state: &AppState,
    alarm_id: Uuid,
    acked_by: Option<&str>,
    note: Option<&str>,
) -> Result<(), BrokerError> {
    let Some(alarm) = state.store.get_alarm(alarm_id).await? else {
        tracing::warn!(alarm_id = %alarm_id, "acked event for unknown alarm");
        return Ok(());
    };
    let Some(ticket_id) = alarm.ticket_id else {
        tracing::info!(alarm_id = %alarm_id, "no external ticket to annotate");
        return Ok(());
    };

    let acked_at = alarm.acked_at.unwrap_or_else(|| state.clock.now());
    let notifier = Notifier::new(state);
    if notifier.ticket_ack_note(&alarm, ticket_id, acked_by, acked_at, note).await {
        tracing::info!(alarm_id = %alarm_id, ticket_id, "ack note added to ticket");
    }
    Ok(())
}

/// Handle the "state changed" event: deliver the signed webhook callback,
/// one audit row per attempt.
pub async fn state_changed(
    state: &AppState,
    alarm_id: Uuid,
    status: AlarmStatus,
) -> Result<(), BrokerError> {
    let channels = &state.channels;
    if !channels.webhook.enabled() {
        return Ok(());
    }
    let Some(alarm) = state.store.get_alarm(alarm_id).await? else {
        tracing::warn!(alarm_id = %alarm_id, "state-changed event for unknown alarm");
        return Ok(());
    };

    let body = serde_json::json!({
        "event": "alarm.state_changed",
        "alarm_id": alarm.id,
        "state": status,
        "severity": alarm.severity,
        "at": state.clock.now().to_rfc3339(),
    });
    let url = state.config.webhook_url.clone();
    let notifier = Notifier::new(state);

    let max_attempts = channels.webhook.max_retries().max(1);
    let mut backoff = Duration::from_millis(500);
    for attempt in 1..=max_attempts {
        let outcome = channels.webhook.post_once(&url, &body).await;
        let audit = serde_json::json!({
            "event": "alarm.state_changed",
            "state": status,
            "attempt": attempt,
        });
        match outcome {
            Ok(()) => {
                Metrics::incr(&state.metrics.notifications_sent);
                notifier
                    .log_notification(
                        alarm.id,
                        ChannelKind::Webhook,
                        None,
                        audit,
                        DispatchResult::Ok,
                        None,
                    )
                    .await;
                return Ok(());
            }
            Err(e) => {
                Metrics::incr(&state.metrics.notifications_failed);
                let result = if e.is_timeout() {
                    DispatchResult::Timeout
                } else {
                    DispatchResult::Error
                };
                notifier
                    .log_notification(
                        alarm.id,
                        ChannelKind::Webhook,
                        None,
                        audit,
                        result,
                        Some(e.to_string()),
                    )
                    .await;
                if attempt < max_attempts {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
            }
        }
    }
    tracing::error!(alarm_id = %alarm_id, "webhook delivery failed after retries");
    Ok(())
}

#[cfg(test)]
#[path = "escalation_tests.rs"]
mod tests;
