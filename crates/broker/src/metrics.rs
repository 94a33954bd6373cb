// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local counters exposed as Prometheus text on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pub http_requests: AtomicU64,
    pub alarms_triggered: AtomicU64,
    pub alarms_deduplicated: AtomicU64,
    pub alarms_rate_limited: AtomicU64,
    pub alarms_acknowledged: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub escalations_skipped: AtomicU64,
    pub jobs_processed: AtomicU64,
}

impl Metrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, help, value) in [
            (
                "alarm_broker_http_requests_total",
                "Total HTTP requests handled.",
                &self.http_requests,
            ),
            (
                "alarm_broker_alarms_triggered_total",
                "Alarms created by the trigger pipeline.",
                &self.alarms_triggered,
            ),
            (
                "alarm_broker_alarms_deduplicated_total",
                "Trigger requests answered from the idempotency window.",
                &self.alarms_deduplicated,
            ),
            (
                "alarm_broker_alarms_rate_limited_total",
                "Trigger requests rejected by the per-token rate limit.",
                &self.alarms_rate_limited,
            ),
            (
                "alarm_broker_alarms_acknowledged_total",
                "Alarms acknowledged.",
                &self.alarms_acknowledged,
            ),
            (
                "alarm_broker_notifications_sent_total",
                "Channel dispatches that succeeded.",
                &self.notifications_sent,
            ),
            (
                "alarm_broker_notifications_failed_total",
                "Channel dispatches that failed.",
                &self.notifications_failed,
            ),
            (
                "alarm_broker_escalations_skipped_total",
                "Deferred escalation jobs skipped because the alarm left TRIGGERED.",
                &self.escalations_skipped,
            ),
            ("alarm_broker_jobs_processed_total", "Worker jobs processed.", &self.jobs_processed),
        ] {
            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!("{name} {}\n", value.load(Ordering::Relaxed)));
        }
        out
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
