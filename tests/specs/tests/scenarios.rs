// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end broker scenarios: trigger, acknowledge, escalate, operate.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use broker_specs::{Broker, ADMIN_KEY};

/// Triggering twice within one 10-second bucket yields one alarm and one
/// created job.
#[tokio::test]
async fn idempotent_trigger() -> anyhow::Result<()> {
    let broker = Broker::start().await?;

    let (first_id, first) = broker.trigger().await?;
    let (second_id, second) = broker.trigger().await?;

    assert_eq!(first["ok"], true);
    assert_eq!(first["duplicate"], false);
    assert_eq!(second["duplicate"], true);
    assert_eq!(first_id, second_id);

    let (ready, _) = broker.queue_depth();
    assert_eq!(ready, 1, "exactly one created job");
    Ok(())
}

/// With a limit of one per minute, a second trigger in a fresh bucket is
/// rejected, creates no alarm, and releases its idempotency reservation.
#[tokio::test]
async fn rate_limit() -> anyhow::Result<()> {
    let broker = Broker::start_with(|config| {
        config.simulation_enabled = false;
        config.rate_limit_per_minute = 1;
    })
    .await?;

    let (first_id, _) = broker.trigger().await?;

    broker.advance(Duration::from_secs(10));
    let resp = broker
        .server
        .get("/v1/yealink/alarm")
        .add_query_param("token", broker_specs::DEVICE_TOKEN)
        .await;
    resp.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // No second alarm exists.
    let resp = broker
        .server
        .get("/v1/alarms")
        .add_header("x-admin-key", ADMIN_KEY)
        .await;
    let page: Vec<serde_json::Value> = resp.json();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], first_id.to_string());

    // The reservation was released: once the minute rolls over, the same
    // bucket-fresh request succeeds.
    broker.advance(Duration::from_secs(60));
    let (third_id, third) = broker.trigger().await?;
    assert_eq!(third["duplicate"], false);
    assert_ne!(third_id, first_id);
    Ok(())
}

/// Trigger → ack page → ack form → resolve, with both timestamps and both
/// actors recorded.
#[tokio::test]
async fn full_lifecycle() -> anyhow::Result<()> {
    let broker = Broker::start().await?;
    let (alarm_id, _) = broker.trigger().await?;

    let token = broker.alarm(alarm_id).await?.ack_token.unwrap_or_default();

    let resp = broker.server.get(&format!("/a/{token}")).await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Acknowledge alarm"));

    let resp = broker
        .server
        .post(&format!("/a/{token}"))
        .form(&[("acked_by", "Jordan"), ("note", "on my way")])
        .await;
    resp.assert_status_ok();

    let alarm = broker.alarm(alarm_id).await?;
    assert_eq!(alarm.status.as_str(), "acknowledged");
    assert!(alarm.acked_at.is_some());
    assert_eq!(alarm.acked_by.as_deref(), Some("Jordan"));

    let resp = broker
        .server
        .post(&format!("/v1/alarms/{alarm_id}/resolve"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({"actor": "Ops", "note": "resolved after check"}))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let alarm = broker.alarm(alarm_id).await?;
    assert_eq!(alarm.status.as_str(), "resolved");
    assert!(alarm.acked_at.is_some());
    assert!(alarm.resolved_at.is_some());
    assert_eq!(alarm.resolved_by.as_deref(), Some("Ops"));
    Ok(())
}

/// Terminal states accept no further transitions.
#[tokio::test]
async fn forbidden_transition_after_resolve() -> anyhow::Result<()> {
    let broker = Broker::start().await?;
    let (alarm_id, _) = broker.trigger().await?;

    let resp = broker
        .server
        .post(&format!("/v1/alarms/{alarm_id}/resolve"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({"actor": "Ops"}))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let resp = broker
        .server
        .post(&format!("/v1/alarms/{alarm_id}/cancel"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({"actor": "Ops"}))
        .await;
    resp.assert_status(StatusCode::CONFLICT);
    Ok(())
}

/// A deferred step that fires after acknowledgment sees the new status and
/// records no channel dispatch.
#[tokio::test]
async fn escalation_skips_after_ack() -> anyhow::Result<()> {
    let broker = Broker::start().await?;
    let (alarm_id, _) = broker.trigger().await?;

    // Process the created event: step 0 fans out, steps 1 and 2 are
    // scheduled.
    broker.run_worker().await;
    let step0_dispatches = broker.hub_notifications().len();
    assert!(step0_dispatches >= 2, "step 0 reached the demo targets");
    let (_, deferred) = broker.queue_depth();
    assert_eq!(deferred, 2);

    // First deferred step fires before anyone acknowledges.
    broker.advance(Duration::from_secs(61));
    broker.run_worker().await;
    let after_step1 = broker.hub_notifications().len();
    assert!(after_step1 > step0_dispatches);

    // Acknowledge, then fast-forward past the second step.
    let token = broker.alarm(alarm_id).await?.ack_token.unwrap_or_default();
    let resp = broker
        .server
        .post(&format!("/a/{token}"))
        .form(&[("acked_by", "Jordan")])
        .await;
    resp.assert_status_ok();
    broker.run_worker().await;
    let after_ack = broker.hub_notifications().len();

    broker.advance(Duration::from_secs(200));
    broker.run_worker().await;

    // The stage-2 job ran but dispatched nothing.
    assert_eq!(broker.hub_notifications().len(), after_ack);
    let (ready, deferred) = broker.queue_depth();
    assert_eq!((ready, deferred), (0, 0));
    Ok(())
}

/// Bulk resolve across a TRIGGERED alarm, an already-RESOLVED alarm, and a
/// random id accounts for every input.
#[tokio::test]
async fn bulk_resolve_mix() -> anyhow::Result<()> {
    let broker = Broker::start().await?;

    let (triggered_id, _) = broker.trigger().await?;
    broker.advance(Duration::from_secs(10));
    let (resolved_id, _) = broker.trigger().await?;

    let resp = broker
        .server
        .post(&format!("/v1/alarms/{resolved_id}/resolve"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({"actor": "Ops"}))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let (jobs_before, _) = broker.queue_depth();
    let ghost = Uuid::new_v4();

    let resp = broker
        .server
        .post("/v1/alarms/bulk/resolve")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "alarm_ids": [triggered_id, resolved_id, ghost],
            "actor": "Ops",
        }))
        .await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["requested"], 3);
    assert_eq!(body["changed"], 1);
    assert_eq!(body["unchanged"], 1);
    assert_eq!(body["missing"], json!([ghost.to_string()]));

    // requested = changed + unchanged + missing
    let missing = body["missing"].as_array().map(Vec::len).unwrap_or_default();
    assert_eq!(
        body["requested"].as_u64().unwrap_or_default(),
        body["changed"].as_u64().unwrap_or_default()
            + body["unchanged"].as_u64().unwrap_or_default()
            + missing as u64
    );

    // Exactly one new state-changed event was enqueued.
    let (jobs_after, _) = broker.queue_depth();
    assert_eq!(jobs_after, jobs_before + 1);
    Ok(())
}
