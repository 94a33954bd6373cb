// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end broker scenarios.
//!
//! Runs the full router in-process over the in-memory ports, with a manual
//! clock so deferred escalations can be fast-forwarded deterministically.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use uuid::Uuid;

use alarm_broker::queue::Worker;
use alarm_broker::state::AppState;
use alarm_broker::store::Store;
use alarm_broker::test_support::{
    apply_demo_seed, memory_state, test_config, TestHarness, DEMO_ADMIN_KEY, DEMO_DEVICE_TOKEN,
};
use alarm_broker::transport::build_router;

pub const ADMIN_KEY: &str = DEMO_ADMIN_KEY;
pub const DEVICE_TOKEN: &str = DEMO_DEVICE_TOKEN;

/// One fully wired broker: router, worker, manual clock, simulation hub.
pub struct Broker {
    pub server: TestServer,
    pub state: Arc<AppState>,
    harness: TestHarness,
    worker: Worker,
}

impl Broker {
    /// Seeded broker in simulation mode.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Seeded broker with a config tweak applied before assembly.
    pub async fn start_with(
        tweak: impl FnOnce(&mut alarm_broker::config::BrokerConfig),
    ) -> anyhow::Result<Self> {
        let mut config = test_config();
        tweak(&mut config);
        let harness = memory_state(config);
        apply_demo_seed(&harness.state).await;

        let server = TestServer::new(build_router(harness.state.clone()))
            .map_err(|e| anyhow::anyhow!("failed to create test server: {e}"))?;
        let worker = Worker::new(harness.state.clone());
        Ok(Self { server, state: harness.state.clone(), harness, worker })
    }

    /// Advance the manual clock.
    pub fn advance(&self, duration: Duration) {
        self.harness.clock.advance(duration);
    }

    /// Promote due deferred jobs and drain the queue, like a worker tick.
    pub async fn run_worker(&self) -> usize {
        self.worker.run_pending().await
    }

    /// Trigger one alarm through the device endpoint.
    pub async fn trigger(&self) -> anyhow::Result<(Uuid, serde_json::Value)> {
        let resp =
            self.server.get("/v1/yealink/alarm").add_query_param("token", DEVICE_TOKEN).await;
        anyhow::ensure!(
            resp.status_code().is_success(),
            "trigger failed with {}",
            resp.status_code()
        );
        let body: serde_json::Value = resp.json();
        let id = body["alarm_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("missing alarm_id in {body}"))?;
        Ok((id, body))
    }

    /// Fetch an alarm row straight from the store.
    pub async fn alarm(&self, id: Uuid) -> anyhow::Result<alarm_broker::store::Alarm> {
        self.state
            .store
            .get_alarm(id)
            .await
            .map_err(|e| anyhow::anyhow!("store read failed: {e}"))?
            .ok_or_else(|| anyhow::anyhow!("alarm {id} not found"))
    }

    /// Channel dispatches recorded in the simulation hub.
    pub fn hub_notifications(&self) -> Vec<alarm_broker::channels::MockNotification> {
        self.state.channels.hub.as_ref().map(|hub| hub.all()).unwrap_or_default()
    }

    /// Ready + deferred queue depth.
    pub fn queue_depth(&self) -> (usize, usize) {
        self.harness.queue.depth()
    }
}
