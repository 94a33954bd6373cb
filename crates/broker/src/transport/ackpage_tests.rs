// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::TimeZone;
use uuid::Uuid;

use super::*;
use crate::notify::Enriched;

fn alarm_with_status(status: AlarmStatus) -> Alarm {
    Alarm {
        id: Uuid::new_v4(),
        status,
        source: "yealink".into(),
        event: "alarm.trigger".into(),
        created_at: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap_or_default(),
        person_id: Some("person:1".into()),
        room_id: Some("room:1".into()),
        site_id: None,
        device_id: None,
        severity: "P0".into(),
        silent: true,
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
fn escape_neutralizes_markup() {
    assert_eq!(escape_html("<script>"), "&lt;script&gt;");
    assert_eq!(escape_html(r#"a"b'c&d"#), "a&quot;b&#x27;c&amp;d");
}

#[test]
fn triggered_page_shows_the_form() {
    let alarm = alarm_with_status(AlarmStatus::Triggered);
    let enriched = Enriched {
        person_name: "Anna Example".into(),
        room_label: "Room 301".into(),
        site_name: None,
    };
    let html = render(&alarm, &enriched);
    assert!(html.contains("<form method=\"post\""));
    assert!(html.contains("Anna Example"));
    assert!(html.contains("Acknowledge alarm"));
}

#[test]
fn acknowledged_page_has_no_form() {
    let alarm = alarm_with_status(AlarmStatus::Acknowledged);
    let enriched =
        Enriched { person_name: "Anna".into(), room_label: "301".into(), site_name: None };
    let html = render(&alarm, &enriched);
    assert!(!html.contains("<form"));
    assert!(html.contains("already been acknowledged"));
}

#[test]
fn hostile_person_names_are_escaped() {
    let alarm = alarm_with_status(AlarmStatus::Triggered);
    let enriched = Enriched {
        person_name: "<script>alert(1)</script>".into(),
        room_label: "301".into(),
        site_name: None,
    };
    let html = render(&alarm, &enriched);
    assert!(!html.contains("<script>alert"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
}
