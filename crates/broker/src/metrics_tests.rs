// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn render_includes_counters() {
    let metrics = Metrics::default();
    Metrics::incr(&metrics.alarms_triggered);
    Metrics::incr(&metrics.alarms_triggered);
    Metrics::incr(&metrics.notifications_sent);

    let text = metrics.render();
    assert!(text.contains("alarm_broker_alarms_triggered_total 2"));
    assert!(text.contains("alarm_broker_notifications_sent_total 1"));
    assert!(text.contains("# TYPE alarm_broker_http_requests_total counter"));
}
