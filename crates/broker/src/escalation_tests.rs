// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use super::*;
use crate::queue::Worker;
use crate::test_support::{apply_demo_seed, memory_state, test_config, DEMO_DEVICE_TOKEN};
use crate::trigger::{process, TriggerRequest};

async fn trigger_demo_alarm(harness: &crate::test_support::TestHarness) -> uuid::Uuid {
    let outcome = process(
        &harness.state,
        TriggerRequest {
            token: DEMO_DEVICE_TOKEN.to_owned(),
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            user_agent: String::new(),
            event: None,
            severity: None,
        },
    )
    .await
    .expect("trigger");
    outcome.alarm_id
}

#[tokio::test]
async fn created_event_dispatches_step_zero_and_schedules_the_rest() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;
    let alarm_id = trigger_demo_alarm(&harness).await;

    let worker = Worker::new(harness.state.clone());
    assert_eq!(worker.run_pending().await, 1);

    // Step 0 fanned out to both demo targets, and the mock ticket channel
    // opened a ticket that got stamped back onto the alarm.
    let alarm = harness
        .state
        .store
        .get_alarm(alarm_id)
        .await
        .expect("store read")
        .expect("alarm exists");
    assert!(alarm.ticket_id.is_some());

    let rows = harness.state.store.list_notifications(alarm_id).await.expect("rows");
    // One ticket-create row plus one row per step-0 target.
    assert_eq!(rows.len(), 3);

    // Two deferred steps (60 s and 180 s) are waiting.
    let (_ready, deferred) = harness.queue.depth();
    assert_eq!(deferred, 2);
}

#[tokio::test]
async fn deferred_steps_fire_only_while_triggered() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;
    let alarm_id = trigger_demo_alarm(&harness).await;

    let worker = Worker::new(harness.state.clone());
    assert_eq!(worker.run_pending().await, 1);
    let baseline = harness.state.store.list_notifications(alarm_id).await.expect("rows").len();

    // First deferred step fires while still TRIGGERED.
    harness.clock.advance(Duration::from_secs(61));
    assert!(worker.run_pending().await >= 1);
    let after_step1 =
        harness.state.store.list_notifications(alarm_id).await.expect("rows").len();
    assert!(after_step1 > baseline);

    // Acknowledge, then fast-forward past the second step: it runs but
    // records no channel dispatch.
    let mut alarm = harness
        .state
        .store
        .get_alarm(alarm_id)
        .await
        .expect("store read")
        .expect("alarm exists");
    let _ = crate::alarm::acknowledge(
        &*harness.state.store,
        &*harness.state.clock,
        &mut alarm,
        Some("Ops"),
        None,
    )
    .await;

    harness.clock.advance(Duration::from_secs(200));
    let _ = worker.run_pending().await;
    let after_step2 =
        harness.state.store.list_notifications(alarm_id).await.expect("rows").len();
    assert_eq!(after_step2, after_step1);
}

#[tokio::test]
async fn acked_event_adds_a_ticket_note() {
    let harness = memory_state(test_config());
    apply_demo_seed(&harness.state).await;
    let alarm_id = trigger_demo_alarm(&harness).await;

    let worker = Worker::new(harness.state.clone());
    let _ = worker.run_pending().await;

    alarm_acked(&harness.state, alarm_id, Some("Ops"), Some("on my way"))
        .await
        .expect("acked handler");

    let hub = harness.state.channels.hub.clone().expect("simulation hub");
    let notes: Vec<_> = hub
        .by_channel("ticket")
        .into_iter()
        .filter(|n| n.payload["action"] == "internal_note")
        .collect();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].payload["body"].as_str().is_some_and(|b| b.contains("Ops")));
}
