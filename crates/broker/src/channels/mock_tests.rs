// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;

#[tokio::test]
async fn hub_records_and_filters_by_channel() {
    let hub = Arc::new(MockHub::new());
    let sms = MockMessageChannel::new(hub.clone(), "sms");
    let chat = MockMessageChannel::new(hub.clone(), "group-chat");

    let _ = sms.send("+15550001", "hello").await;
    let _ = chat.send("group-1", "hello").await;

    assert_eq!(hub.all().len(), 2);
    assert_eq!(hub.by_channel("sms").len(), 1);
    assert_eq!(hub.by_channel("group-chat").len(), 1);

    hub.clear();
    assert!(hub.all().is_empty());
}

#[tokio::test]
async fn mock_tickets_count_upward() {
    let hub = Arc::new(MockHub::new());
    let tickets = MockTicketChannel::new(hub.clone());

    let req = TicketRequest {
        title: "EMERGENCY ALARM".into(),
        group: "desk".into(),
        priority: 3,
        customer: "c".into(),
        tags: vec!["emergency".into()],
        subject: "s".into(),
        body: "b".into(),
    };
    let first = tickets.create_ticket(&req).await.unwrap_or(0);
    let second = tickets.create_ticket(&req).await.unwrap_or(0);
    assert_eq!(second, first + 1);
}

#[test]
fn hub_is_bounded() {
    let hub = MockHub::new();
    for i in 0..400 {
        hub.record("sms", serde_json::json!({"i": i}));
    }
    let all = hub.all();
    assert_eq!(all.len(), 256);
    // Oldest entries fell off the front.
    assert_eq!(all[0].payload["i"], 144);
}
