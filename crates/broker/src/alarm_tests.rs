// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use chrono::TimeZone;
use uuid::Uuid;

use super::*;
use crate::clock::{Clock, ManualClock};
use crate::error::BrokerError;
use crate::store::{Alarm, AlarmStatus, MemoryStore, Store};

fn clock() -> Arc<ManualClock> {
    let start = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap_or_default();
    Arc::new(ManualClock::new(start))
}

fn triggered_alarm(clock: &ManualClock) -> Alarm {
    Alarm {
        id: Uuid::new_v4(),
        status: AlarmStatus::Triggered,
        source: "yealink".into(),
        event: "alarm.trigger".into(),
        created_at: clock.now(),
        person_id: Some("person:1".into()),
        room_id: Some("room:1".into()),
        site_id: Some("site:1".into()),
        device_id: None,
        severity: "P0".into(),
        silent: true,
        ticket_id: None,
        ack_token: Some(crate::clock::new_ack_token()),
        acked_at: None,
        acked_by: None,
        resolved_at: None,
        resolved_by: None,
        cancelled_at: None,
        cancelled_by: None,
        deleted_at: None,
        deleted_by: None,
        meta: serde_json::json!({"received_at": "t0"}),
    }
}

#[test]
fn transition_table_matches_the_lifecycle() {
    use AlarmStatus::{Acknowledged, Cancelled, Resolved, Triggered};
    assert!(transition_allowed(Triggered, Acknowledged));
    assert!(transition_allowed(Triggered, Resolved));
    assert!(transition_allowed(Triggered, Cancelled));
    assert!(transition_allowed(Acknowledged, Resolved));
    assert!(transition_allowed(Acknowledged, Cancelled));
    // Terminal states accept nothing.
    for to in [Triggered, Acknowledged, Resolved, Cancelled] {
        assert!(!transition_allowed(Resolved, to));
        assert!(!transition_allowed(Cancelled, to));
    }
    assert!(!transition_allowed(Acknowledged, Triggered));
}

#[tokio::test]
async fn acknowledge_sets_timestamp_actor_and_note() {
    let clock = clock();
    let store = MemoryStore::new();
    let mut alarm = triggered_alarm(&clock);
    let _ = store.create_alarm(&alarm).await;

    let changed = acknowledge(&store, &*clock, &mut alarm, Some("Ops"), Some("on it"))
        .await
        .unwrap_or(false);
    assert!(changed);
    assert_eq!(alarm.status, AlarmStatus::Acknowledged);
    assert_eq!(alarm.acked_by.as_deref(), Some("Ops"));
    assert!(alarm.acked_at.is_some());
    assert_eq!(alarm.meta["ack_note"], "on it");
    // Existing meta fields survive the merge.
    assert_eq!(alarm.meta["received_at"], "t0");
}

#[tokio::test]
async fn acknowledge_twice_is_a_no_op() {
    let clock = clock();
    let store = MemoryStore::new();
    let mut alarm = triggered_alarm(&clock);
    let _ = store.create_alarm(&alarm).await;

    let first = acknowledge(&store, &*clock, &mut alarm, Some("A"), None).await.unwrap_or(false);
    let second = acknowledge(&store, &*clock, &mut alarm, Some("B"), None).await.unwrap_or(true);
    assert!(first);
    assert!(!second);
    // The first actor sticks.
    assert_eq!(alarm.acked_by.as_deref(), Some("A"));
}

#[tokio::test]
async fn forbidden_transition_is_a_conflict() {
    let clock = clock();
    let store = MemoryStore::new();
    let mut alarm = triggered_alarm(&clock);
    let _ = store.create_alarm(&alarm).await;

    let changed =
        transition(&store, &*clock, &mut alarm, AlarmStatus::Resolved, Some("Ops"), None)
            .await
            .unwrap_or(false);
    assert!(changed);

    let err = transition(&store, &*clock, &mut alarm, AlarmStatus::Cancelled, Some("Ops"), None)
        .await;
    assert!(matches!(err, Err(BrokerError::Conflict(_))));
}

#[tokio::test]
async fn same_status_transition_is_a_silent_no_op() {
    let clock = clock();
    let store = MemoryStore::new();
    let mut alarm = triggered_alarm(&clock);
    let _ = store.create_alarm(&alarm).await;

    let _ = transition(&store, &*clock, &mut alarm, AlarmStatus::Resolved, Some("Ops"), None).await;
    let again =
        transition(&store, &*clock, &mut alarm, AlarmStatus::Resolved, Some("Ops"), None).await;
    assert!(matches!(again, Ok(false)));
}

#[tokio::test]
async fn soft_delete_twice_conflicts() {
    let clock = clock();
    let store = MemoryStore::new();
    let mut alarm = triggered_alarm(&clock);
    let _ = store.create_alarm(&alarm).await;

    assert!(soft_delete(&store, &*clock, &mut alarm, Some("admin")).await.is_ok());
    assert!(alarm.deleted_at.is_some());
    let err = soft_delete(&store, &*clock, &mut alarm, Some("admin")).await;
    assert!(matches!(err, Err(BrokerError::Conflict(_))));
}
