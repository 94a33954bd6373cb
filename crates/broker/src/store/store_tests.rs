// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).single().unwrap_or_default()
}

fn alarm(minute: u32, severity: &str) -> Alarm {
    Alarm {
        id: Uuid::new_v4(),
        status: AlarmStatus::Triggered,
        source: "yealink".into(),
        event: "alarm.trigger".into(),
        created_at: at(minute),
        person_id: Some("person:1".into()),
        room_id: Some("room:1".into()),
        site_id: Some("site:1".into()),
        device_id: None,
        severity: severity.into(),
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
        meta: serde_json::json!({}),
    }
}

#[tokio::test]
async fn cursor_pagination_visits_every_alarm_exactly_once() {
    let store = MemoryStore::new();
    let mut ids = Vec::new();
    for minute in 0..7 {
        let a = alarm(minute, "P0");
        ids.push(a.id);
        let _ = store.create_alarm(&a).await;
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let query = AlarmQuery {
            limit: 3,
            cursor,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            ..AlarmQuery::default()
        };
        let page = store.list_alarms(&query).await.unwrap_or_default();
        let has_more = page.len() > 3;
        let page: Vec<Alarm> = page.into_iter().take(3).collect();
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|a| a.id);
        seen.extend(page.into_iter().map(|a| a.id));
        if !has_more {
            break;
        }
    }

    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);
}

#[tokio::test]
async fn list_orders_desc_by_created_at_then_id() {
    let store = MemoryStore::new();
    for minute in 0..3 {
        let _ = store.create_alarm(&alarm(minute, "P0")).await;
    }
    let query =
        AlarmQuery { limit: 10, sort_order: SortOrder::Desc, ..AlarmQuery::default() };
    let page = store.list_alarms(&query).await.unwrap_or_default();
    assert_eq!(page.len(), 3);
    assert!(page[0].created_at >= page[1].created_at);
    assert!(page[1].created_at >= page[2].created_at);
}

#[tokio::test]
async fn filters_apply() {
    let store = MemoryStore::new();
    let _ = store.create_alarm(&alarm(0, "P0")).await;
    let _ = store.create_alarm(&alarm(1, "P2")).await;

    let query = AlarmQuery {
        severity: Some("P2".into()),
        limit: 10,
        ..AlarmQuery::default()
    };
    let page = store.list_alarms(&query).await.unwrap_or_default();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].severity, "P2");

    let query = AlarmQuery {
        created_after: Some(at(1)),
        limit: 10,
        ..AlarmQuery::default()
    };
    let page = store.list_alarms(&query).await.unwrap_or_default();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn soft_deleted_alarms_are_hidden_by_default() {
    let store = MemoryStore::new();
    let mut a = alarm(0, "P0");
    a.deleted_at = Some(at(5));
    let _ = store.create_alarm(&a).await;

    let query = AlarmQuery { limit: 10, ..AlarmQuery::default() };
    assert!(store.list_alarms(&query).await.unwrap_or_default().is_empty());

    let query = AlarmQuery { limit: 10, include_deleted: true, ..AlarmQuery::default() };
    assert_eq!(store.list_alarms(&query).await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn stats_count_by_status_and_severity() {
    let store = MemoryStore::new();
    let _ = store.create_alarm(&alarm(0, "P0")).await;
    let _ = store.create_alarm(&alarm(1, "P0")).await;
    let mut resolved = alarm(2, "P1");
    resolved.status = AlarmStatus::Resolved;
    let _ = store.create_alarm(&resolved).await;

    let stats = store.alarm_stats().await.unwrap_or_default();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_status.get("triggered"), Some(&2));
    assert_eq!(stats.by_status.get("resolved"), Some(&1));
    assert_eq!(stats.by_severity.get("P0"), Some(&2));
}

#[tokio::test]
async fn device_upsert_is_keyed_by_token() {
    let store = MemoryStore::new();
    let device = Device {
        id: "device:1".into(),
        vendor: "yealink".into(),
        model_family: "T5".into(),
        mac: None,
        account_ext: None,
        device_token: "TOK".into(),
        person_id: None,
        room_id: None,
        last_seen_at: None,
    };
    let _ = store.upsert_device(&device).await;

    let rebound = Device {
        person_id: Some("person:1".into()),
        room_id: Some("room:1".into()),
        ..device.clone()
    };
    let stored = store.upsert_device(&rebound).await.unwrap_or(device);
    assert!(stored.is_bound());

    let found = store.get_device_by_token("TOK").await.unwrap_or_default();
    assert!(found.is_some_and(|d| d.person_id.as_deref() == Some("person:1")));
}

#[test]
fn meta_merge_never_drops_existing_fields() {
    let mut a = alarm(0, "P0");
    a.meta = serde_json::json!({"received_at": "x"});
    a.merge_meta("ack_note", serde_json::json!("on my way"));
    assert_eq!(a.meta["received_at"], "x");
    assert_eq!(a.meta["ack_note"], "on my way");
}
