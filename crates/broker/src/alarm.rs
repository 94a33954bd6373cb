// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm state machine.
//!
//! The transition table, the same-status no-op, and the atomic
//! (status, timestamp, actor) write live here and nowhere else.

use crate::clock::Clock;
use crate::error::BrokerError;
use crate::store::{Alarm, AlarmStatus, Store};

/// Allowed transitions. RESOLVED and CANCELLED are terminal.
pub fn transition_allowed(from: AlarmStatus, to: AlarmStatus) -> bool {
    use AlarmStatus::{Acknowledged, Cancelled, Resolved, Triggered};
    match from {
        Triggered => matches!(to, Acknowledged | Resolved | Cancelled),
        Acknowledged => matches!(to, Resolved | Cancelled),
        Resolved | Cancelled => false,
    }
}

/// Acknowledge from TRIGGERED. Any other current status is a silent no-op
/// (`Ok(false)`), which is what makes the ack link single-use.
pub async fn acknowledge(
    store: &dyn Store,
    clock: &dyn Clock,
    alarm: &mut Alarm,
    acked_by: Option<&str>,
    note: Option<&str>,
) -> Result<bool, BrokerError> {
    if alarm.status != AlarmStatus::Triggered {
        return Ok(false);
    }
    alarm.status = AlarmStatus::Acknowledged;
    alarm.acked_at = Some(clock.now());
    alarm.acked_by = acked_by.map(str::to_owned);
    if let Some(note) = note {
        alarm.merge_meta("ack_note", serde_json::Value::String(note.to_owned()));
    }
    store.update_alarm(alarm).await?;
    Ok(true)
}

/// Drive the alarm to `target`. Same-status is a no-op; a forbidden
/// transition is a conflict. On success the matching timestamp/actor pair is
/// written together with the status in one store update.
pub async fn transition(
    store: &dyn Store,
    clock: &dyn Clock,
    alarm: &mut Alarm,
    target: AlarmStatus,
    actor: Option<&str>,
    note: Option<&str>,
) -> Result<bool, BrokerError> {
    if alarm.status == target {
        return Ok(false);
    }
    if !transition_allowed(alarm.status, target) {
        return Err(BrokerError::Conflict(format!(
            "invalid status transition: {} -> {}",
            alarm.status, target
        )));
    }

    let now = clock.now();
    alarm.status = target;
    match target {
        AlarmStatus::Acknowledged => {
            alarm.acked_at = Some(now);
            alarm.acked_by = actor.map(str::to_owned);
            if let Some(note) = note {
                alarm.merge_meta("ack_note", serde_json::Value::String(note.to_owned()));
            }
        }
        AlarmStatus::Resolved => {
            alarm.resolved_at = Some(now);
            alarm.resolved_by = actor.map(str::to_owned);
            if let Some(note) = note {
                alarm.merge_meta("resolve_note", serde_json::Value::String(note.to_owned()));
            }
        }
        AlarmStatus::Cancelled => {
            alarm.cancelled_at = Some(now);
            alarm.cancelled_by = actor.map(str::to_owned);
            if let Some(note) = note {
                alarm.merge_meta("cancel_note", serde_json::Value::String(note.to_owned()));
            }
        }
        AlarmStatus::Triggered => {}
    }
    store.update_alarm(alarm).await?;
    Ok(true)
}

/// Soft-delete. Deleting twice is a conflict.
pub async fn soft_delete(
    store: &dyn Store,
    clock: &dyn Clock,
    alarm: &mut Alarm,
    deleted_by: Option<&str>,
) -> Result<(), BrokerError> {
    if alarm.deleted_at.is_some() {
        return Err(BrokerError::Conflict("alarm already deleted".to_owned()));
    }
    alarm.deleted_at = Some(clock.now());
    alarm.deleted_by = deleted_by.map(str::to_owned);
    store.update_alarm(alarm).await?;
    Ok(())
}

#[cfg(test)]
#[path = "alarm_tests.rs"]
mod tests;
