// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::{MemoryStore, Store};

const YAML_SEED: &str = r#"
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
    active: "true"
devices:
  - device_token: YLK_T54W_3F9A
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
"#;

#[test]
fn yaml_and_json_parse_to_the_same_shape() {
    let from_yaml = parse_seed("application/yaml", YAML_SEED.as_bytes()).unwrap_or_default();
    assert_eq!(from_yaml.sites.len(), 1);
    assert_eq!(from_yaml.devices.len(), 1);
    assert_eq!(from_yaml.escalation_steps.len(), 2);
    assert!(from_yaml.persons[0].active);

    let json = r#"{"sites": [{"id": "site:hq", "name": "Headquarters"}]}"#;
    let from_json = parse_seed("application/json", json.as_bytes()).unwrap_or_default();
    assert_eq!(from_json.sites.len(), 1);
}

#[test]
fn invalid_payloads_are_rejected() {
    assert!(parse_seed("application/json", b"not json").is_err());
    assert!(parse_seed("application/yaml", b"{invalid: [yaml").is_err());
    assert!(parse_seed("application/json", b"[1, 2]").is_err());
}

#[test]
fn env_references_expand_with_coercion() {
    std::env::set_var("SEED_TEST_FLAG", "false");
    std::env::set_var("SEED_TEST_NUMBER", "42");

    let json = r#"{
        "persons": [
            {"id": "p", "display_name": "P", "active": "${SEED_TEST_FLAG}"}
        ],
        "escalation_steps": [
            {"step_no": 1, "after_seconds": "${SEED_TEST_NUMBER}", "target_ids": []}
        ]
    }"#;
    let data = parse_seed("application/json", json.as_bytes()).unwrap_or_default();
    assert!(!data.persons[0].active);
    assert_eq!(data.escalation_steps[0].after_seconds, 42);
}

#[tokio::test]
async fn apply_upserts_and_replaces_steps() {
    let store = MemoryStore::new();
    let data = parse_seed("application/yaml", YAML_SEED.as_bytes()).unwrap_or_default();
    assert!(apply_seed(&store, &data).await.is_ok());

    let device = store.get_device_by_token("YLK_T54W_3F9A").await.unwrap_or_default();
    assert!(device.is_some_and(|d| d.is_bound()));

    let step0 = store.steps_with_targets("default", 0).await.unwrap_or_default();
    assert_eq!(step0.len(), 2);
    let deferred = store.deferred_steps("default").await.unwrap_or_default();
    assert_eq!(deferred, vec![(1, 60)]);

    // Re-applying with fewer steps replaces, not appends.
    let mut smaller = data.clone();
    smaller.escalation_steps.truncate(1);
    assert!(apply_seed(&store, &smaller).await.is_ok());
    assert!(store.deferred_steps("default").await.unwrap_or_default().is_empty());
}
