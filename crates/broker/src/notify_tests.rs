// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use uuid::Uuid;

use super::*;
use crate::channels::{ChannelError, Channels, MessageChannel};
use crate::test_support::{apply_demo_seed, memory_state, test_config};

fn sample_alarm(state: &AppState, severity: &str) -> Alarm {
    Alarm {
        id: Uuid::new_v4(),
        status: crate::store::AlarmStatus::Triggered,
        source: "yealink".into(),
        event: "alarm.trigger".into(),
        created_at: state.clock.now(),
        person_id: Some("person:anna".into()),
        room_id: Some("room:301".into()),
        site_id: Some("site:hq".into()),
        device_id: None,
        severity: severity.into(),
        silent: severity == "P0",
        ticket_id: None,
        ack_token: Some("tok".into()),
        acked_at: None,
        acked_by: None,
        resolved_at: None,
        resolved_by: None,
        cancelled_at: None,
        cancelled_by: None,
        deleted_at: None,
        deleted_by: None,
        meta: serde_json::json!({}),
    }
}

#[test]
fn priority_follows_severity() {
    assert_eq!(severity_priority("P0"), 3);
    assert_eq!(severity_priority("P1"), 2);
    assert_eq!(severity_priority("P2"), 2);
    assert_eq!(severity_priority("P3"), 1);
}

#[tokio::test]
async fn enrichment_resolves_names_and_falls_back_to_ids() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;

    let alarm = sample_alarm(&harness.state, "P0");
    let enriched = enrich(&*harness.state.store, &alarm).await.expect("enrich");
    assert_eq!(enriched.person_name, "Anna Example");
    assert_eq!(enriched.room_label, "Room 301");
    assert_eq!(enriched.site_name.as_deref(), Some("Headquarters"));

    // Unknown bindings fall back to the raw ids.
    let mut orphan = sample_alarm(&harness.state, "P0");
    orphan.person_id = Some("person:ghost".into());
    orphan.room_id = Some("room:ghost".into());
    let enriched = enrich(&*harness.state.store, &orphan).await.expect("enrich");
    assert_eq!(enriched.person_name, "person:ghost");
    assert_eq!(enriched.room_label, "room:ghost");
}

#[tokio::test]
async fn payload_titles_and_tags_vary_by_step_and_severity() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;
    let alarm = sample_alarm(&harness.state, "P0");
    let enriched = enrich(&*harness.state.store, &alarm).await.expect("enrich");

    let step0 = build_payload(&alarm, &enriched, 0, "http://localhost/a/tok");
    assert!(step0.title.starts_with("EMERGENCY ALARM"));
    assert_eq!(step0.tags, vec!["emergency", "silent"]);
    assert_eq!(step0.priority, 3);
    assert!(step0.body.contains("Stage: 0"));
    assert!(step0.body.contains("http://localhost/a/tok"));
    assert!(step0.body.contains("Room 301 / Headquarters"));

    let step2 = build_payload(&alarm, &enriched, 2, "http://localhost/a/tok");
    assert!(step2.title.starts_with("ESCALATION stage 2"));
    assert_eq!(step2.tags, vec!["silent"]);

    let mut p3 = alarm.clone();
    p3.severity = "P3".into();
    let payload = build_payload(&p3, &enriched, 0, "u");
    assert_eq!(payload.tags, vec!["emergency"]);
    assert_eq!(payload.priority, 1);
}

#[tokio::test]
async fn dispatch_writes_one_audit_row_per_target() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;
    let alarm = sample_alarm(&harness.state, "P0");
    let _ = harness.state.store.create_alarm(&alarm).await;
    let enriched = enrich(&*harness.state.store, &alarm).await.expect("enrich");
    let payload = build_payload(&alarm, &enriched, 0, "http://localhost/a/tok");

    Notifier::new(&harness.state).dispatch_step(&alarm, &payload).await.expect("dispatch");

    let rows = harness.state.store.list_notifications(alarm.id).await.expect("rows");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.result == DispatchResult::Ok));

    let hub = harness.state.channels.hub.clone().expect("simulation hub");
    assert_eq!(hub.by_channel("sms").len(), 1);
    assert_eq!(hub.by_channel("group-chat").len(), 1);
}

/// A message channel that always fails, for isolation tests.
struct BrokenChannel;

#[async_trait::async_trait]
impl MessageChannel for BrokenChannel {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, _address: &str, _message: &str) -> Result<(), ChannelError> {
        Err(ChannelError::Timeout("simulated outage".to_owned()))
    }
}

#[tokio::test]
async fn one_failing_channel_does_not_stop_the_next_target() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;

    // Rebind SMS to a channel that always times out; group-chat stays mock.
    let hub = harness.state.channels.hub.clone().expect("simulation hub");
    let mut channels = Channels::simulated(&harness.state.config);
    channels.sms = Arc::new(BrokenChannel);
    channels.hub = Some(hub.clone());
    channels.group_chat = Arc::new(crate::channels::mock::MockMessageChannel::new(
        hub.clone(),
        "group-chat",
    ));
    let state = AppState::new(
        harness.state.config.clone(),
        harness.clock.clone(),
        harness.state.store.clone(),
        harness.state.kv.clone(),
        harness.state.queue.clone(),
        channels,
        tokio_util::sync::CancellationToken::new(),
    );

    let alarm = sample_alarm(&state, "P0");
    let _ = state.store.create_alarm(&alarm).await;
    let enriched = enrich(&*state.store, &alarm).await.expect("enrich");
    let payload = build_payload(&alarm, &enriched, 0, "http://localhost/a/tok");

    Notifier::new(&state).dispatch_step(&alarm, &payload).await.expect("dispatch");

    let rows = state.store.list_notifications(alarm.id).await.expect("rows");
    assert_eq!(rows.len(), 2);
    let timeouts: Vec<_> =
        rows.iter().filter(|r| r.result == DispatchResult::Timeout).collect();
    let oks: Vec<_> = rows.iter().filter(|r| r.result == DispatchResult::Ok).collect();
    assert_eq!(timeouts.len(), 1);
    assert_eq!(oks.len(), 1);
    // The healthy target still went out.
    assert_eq!(hub.by_channel("group-chat").len(), 1);
}
