// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seed payloads: JSON or YAML, with `${VAR}` environment expansion.
//!
//! Upserts are keyed by entity id, except devices which are keyed by their
//! device_token. Steps are replaced wholesale per policy.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::BrokerError;
use crate::store::{
    ChannelKind, Device, EscalationPolicy, EscalationStep, EscalationTarget, Person, Room, Site,
    Store,
};

const YAML_CONTENT_TYPES: [&str; 5] = [
    "application/x-yaml",
    "application/yaml",
    "application/yml",
    "text/yaml",
    "text/x-yaml",
];

const TRUE_VALUES: [&str; 4] = ["1", "true", "yes", "on"];
const FALSE_VALUES: [&str; 4] = ["0", "false", "no", "off"];

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$\{([A-Z0-9_]+)\}$").ok()).as_ref()
}

/// Expand `${VAR}` strings from the environment, coercing boolean and digit
/// strings. Unknown variables become null.
fn expand_env(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            let var = env_pattern()
                .and_then(|pattern| pattern.captures(trimmed))
                .and_then(|captures| captures.get(1));
            match var {
                Some(var) => match std::env::var(var.as_str()) {
                    Ok(resolved) => coerce_scalar(&resolved),
                    Err(_) => serde_json::Value::Null,
                },
                None => serde_json::Value::String(s),
            }
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(expand_env).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter().map(|(k, v)| (k, expand_env(v))).collect(),
        ),
        other => other,
    }
}

fn coerce_scalar(raw: &str) -> serde_json::Value {
    let lowered = raw.trim().to_ascii_lowercase();
    if TRUE_VALUES.contains(&lowered.as_str()) {
        return serde_json::Value::Bool(true);
    }
    if FALSE_VALUES.contains(&lowered.as_str()) {
        return serde_json::Value::Bool(false);
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<i64>() {
            return serde_json::Value::Number(n.into());
        }
    }
    serde_json::Value::String(raw.to_owned())
}

/// Accept booleans written as bools, strings, or 0/1.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        serde_json::Value::String(s) => {
            TRUE_VALUES.contains(&s.trim().to_ascii_lowercase().as_str())
        }
        _ => false,
    })
}

fn default_true() -> bool {
    true
}

fn default_vendor() -> String {
    "yealink".to_owned()
}

fn default_model_family() -> String {
    "T5".to_owned()
}

fn default_policy_id() -> String {
    "default".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSite {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRoom {
    pub id: String,
    pub site_id: String,
    pub label: String,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPerson {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone_mobile: Option<String>,
    #[serde(default)]
    pub phone_ext: Option<String>,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDevice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default = "default_model_family")]
    pub model_family: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub account_ext: Option<String>,
    pub device_token: String,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTarget {
    pub id: String,
    pub label: String,
    pub channel: ChannelKind,
    pub address: String,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStep {
    #[serde(default = "default_policy_id")]
    pub policy_id: String,
    pub step_no: i32,
    pub after_seconds: i64,
    #[serde(default)]
    pub target_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPolicy {
    #[serde(default = "default_policy_id")]
    pub id: String,
    #[serde(default = "default_policy_id")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub sites: Vec<SeedSite>,
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
    #[serde(default)]
    pub persons: Vec<SeedPerson>,
    #[serde(default)]
    pub devices: Vec<SeedDevice>,
    #[serde(default)]
    pub escalation_targets: Vec<SeedTarget>,
    #[serde(default)]
    pub escalation_steps: Vec<SeedStep>,
    #[serde(default)]
    pub escalation_policy: Option<SeedPolicy>,
}

/// Parse a seed body by content type, expanding `${VAR}` references.
pub fn parse_seed(content_type: &str, raw: &[u8]) -> Result<SeedData, BrokerError> {
    let media_type = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    let value: serde_json::Value = if YAML_CONTENT_TYPES.contains(&media_type.as_str()) {
        serde_yaml::from_slice(raw)
            .map_err(|_| BrokerError::invalid_input("Invalid YAML seed payload"))?
    } else {
        let raw = if raw.is_empty() { b"{}" as &[u8] } else { raw };
        serde_json::from_slice(raw)
            .map_err(|_| BrokerError::invalid_input("Invalid JSON seed payload"))?
    };

    if !value.is_object() {
        return Err(BrokerError::invalid_input("Seed payload must be a JSON/YAML object"));
    }

    let expanded = expand_env(value);
    serde_json::from_value(expanded)
        .map_err(|_| BrokerError::invalid_input("Invalid seed structure or values"))
}

/// Apply a parsed seed: upserts for every entity, step replacement per
/// policy.
pub async fn apply_seed(store: &dyn Store, data: &SeedData) -> Result<(), BrokerError> {
    for site in &data.sites {
        store.upsert_site(&Site { id: site.id.clone(), name: site.name.clone() }).await?;
    }
    for room in &data.rooms {
        store
            .upsert_room(&Room {
                id: room.id.clone(),
                site_id: room.site_id.clone(),
                label: room.label.clone(),
                floor: room.floor.clone(),
                notes: room.notes.clone(),
            })
            .await?;
    }
    for person in &data.persons {
        store
            .upsert_person(&Person {
                id: person.id.clone(),
                display_name: person.display_name.clone(),
                role: person.role.clone(),
                phone_mobile: person.phone_mobile.clone(),
                phone_ext: person.phone_ext.clone(),
                active: person.active,
            })
            .await?;
    }
    for device in &data.devices {
        store
            .upsert_device(&Device {
                id: device
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("device:{}", device.device_token)),
                vendor: device.vendor.clone(),
                model_family: device.model_family.clone(),
                mac: device.mac.clone(),
                account_ext: device.account_ext.clone(),
                device_token: device.device_token.clone(),
                person_id: device.person_id.clone(),
                room_id: device.room_id.clone(),
                last_seen_at: None,
            })
            .await?;
    }
    // Steps may name a policy the payload never declares; make sure the row
    // exists before the declared policy (if any) sets its real name.
    let mut policy_ids: Vec<String> =
        data.escalation_steps.iter().map(|s| s.policy_id.clone()).collect();
    policy_ids.sort();
    policy_ids.dedup();
    for policy_id in &policy_ids {
        store
            .upsert_policy(&EscalationPolicy { id: policy_id.clone(), name: policy_id.clone() })
            .await?;
    }
    if let Some(ref policy) = data.escalation_policy {
        store
            .upsert_policy(&EscalationPolicy { id: policy.id.clone(), name: policy.name.clone() })
            .await?;
    }
    for target in &data.escalation_targets {
        store
            .upsert_target(&EscalationTarget {
                id: target.id.clone(),
                label: target.label.clone(),
                channel: target.channel,
                address: target.address.clone(),
                enabled: target.enabled,
            })
            .await?;
    }

    if !data.escalation_steps.is_empty() {
        for policy_id in &policy_ids {
            let steps: Vec<EscalationStep> = data
                .escalation_steps
                .iter()
                .filter(|s| &s.policy_id == policy_id)
                .flat_map(|s| {
                    s.target_ids.iter().map(move |target_id| EscalationStep {
                        policy_id: s.policy_id.clone(),
                        step_no: s.step_no,
                        after_seconds: s.after_seconds,
                        target_id: target_id.clone(),
                    })
                })
                .collect();
            store.replace_policy_steps(policy_id, &steps).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;
