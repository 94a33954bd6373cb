// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit, integration, and spec tests: a manual clock,
//! in-memory ports, simulated channels, and a small demo seed.

use std::sync::Arc;

use chrono::TimeZone;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::channels::Channels;
use crate::clock::ManualClock;
use crate::config::BrokerConfig;
use crate::kv::MemoryKv;
use crate::queue::MemoryQueue;
use crate::seed::{apply_seed, parse_seed};
use crate::state::AppState;
use crate::store::MemoryStore;

pub const DEMO_DEVICE_TOKEN: &str = "YLK_T54W_3F9A";
pub const DEMO_ADMIN_KEY: &str = "dev-admin-key";

#[derive(Parser)]
struct ConfigWrapper {
    #[command(flatten)]
    config: BrokerConfig,
}

/// Default configuration with simulation mode and a known admin key.
pub fn test_config() -> BrokerConfig {
    let mut config = ConfigWrapper::parse_from(["alarm-broker"]).config;
    config.admin_api_key = DEMO_ADMIN_KEY.to_owned();
    config.simulation_enabled = true;
    config
}

/// A manual clock pinned to a fixed instant.
pub fn manual_clock() -> Arc<ManualClock> {
    let start =
        chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap_or_default();
    Arc::new(ManualClock::new(start))
}

/// One assembled in-memory broker for tests: the state plus direct handles
/// to the clock and queue that drive it.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub queue: Arc<MemoryQueue>,
}

/// Build an `AppState` over in-memory ports and simulated channels.
pub fn memory_state(config: BrokerConfig) -> TestHarness {
    let clock = manual_clock();
    let queue = Arc::new(MemoryQueue::new(clock.clone()));
    let channels = Channels::simulated(&config);
    let state = AppState::new(
        config,
        clock.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryKv::new(clock.clone())),
        queue.clone(),
        channels,
        CancellationToken::new(),
    );
    TestHarness { state: Arc::new(state), clock, queue }
}

/// Demo fixture: one site/room/person, one bound device, SMS + group-chat
/// targets, immediate fan-out plus two deferred steps.
pub fn demo_seed_yaml() -> String {
    format!(
        r#"
sites:
  - id: "site:hq"
    name: Headquarters
rooms:
  - id: "room:301"
    site_id: "site:hq"
    label: Room 301
    floor: "3"
persons:
  - id: "person:anna"
    display_name: Anna Example
devices:
  - device_token: {DEMO_DEVICE_TOKEN}
    person_id: "person:anna"
    room_id: "room:301"
escalation_policy:
  id: default
  name: Default
escalation_targets:
  - id: "target:desk"
    label: Front desk
    channel: sms
    address: "+15550100"
  - id: "target:chat"
    label: Response chat
    channel: group-chat
    address: "group-1"
escalation_steps:
  - policy_id: default
    step_no: 0
    after_seconds: 0
    target_ids: ["target:desk", "target:chat"]
  - policy_id: default
    step_no: 1
    after_seconds: 60
    target_ids: ["target:desk"]
  - policy_id: default
    step_no: 2
    after_seconds: 180
    target_ids: ["target:chat"]
"#
    )
}

/// Apply the demo fixture to a state's store.
pub async fn apply_demo_seed(state: &AppState) {
    let yaml = demo_seed_yaml();
    let data = match parse_seed("application/yaml", yaml.as_bytes()) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(err = %e, "demo seed failed to parse");
            return;
        }
    };
    if let Err(e) = apply_seed(&*state.store, &data).await {
        tracing::error!(err = %e, "demo seed failed to apply");
    }
}
