// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin config mutations: device upsert, escalation policy, seed.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::BrokerError;
use crate::seed;
use crate::state::AppState;
use crate::store::{
    ChannelKind, Device, EscalationPolicy, EscalationStep, EscalationTarget, Store,
};

#[derive(Debug, Deserialize)]
pub struct DeviceUpsertIn {
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

fn default_vendor() -> String {
    "yealink".to_owned()
}

fn default_model_family() -> String {
    "T5".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct TargetIn {
    pub id: String,
    pub label: String,
    pub channel: ChannelKind,
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StepIn {
    pub step_no: i32,
    pub after_seconds: i64,
    pub target_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalationPolicyIn {
    #[serde(default = "default_policy_id")]
    pub policy_id: String,
    #[serde(default = "default_policy_name")]
    pub name: String,
    #[serde(default)]
    pub targets: Vec<TargetIn>,
    #[serde(default)]
    pub steps: Vec<StepIn>,
}

fn default_policy_id() -> String {
    "default".to_owned()
}

fn default_policy_name() -> String {
    "Default".to_owned()
}

/// `POST /v1/admin/devices` — upsert keyed by device_token.
pub async fn upsert_device(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeviceUpsertIn>,
) -> Result<Json<serde_json::Value>, BrokerError> {
    if body.device_token.trim().is_empty() {
        return Err(BrokerError::invalid_field("device_token must not be empty", "device_token"));
    }
    let device = Device {
        id: body.id.clone().unwrap_or_else(|| format!("device:{}", body.device_token)),
        vendor: body.vendor,
        model_family: body.model_family,
        mac: body.mac,
        account_ext: body.account_ext,
        device_token: body.device_token,
        person_id: body.person_id,
        room_id: body.room_id,
        last_seen_at: None,
    };
    let stored = state.store.upsert_device(&device).await?;
    Ok(Json(serde_json::json!({"ok": "true", "device_id": stored.id})))
}

/// `POST /v1/admin/escalation-policy` — validate and apply one policy.
pub async fn apply_policy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EscalationPolicyIn>,
) -> Result<Json<serde_json::Value>, BrokerError> {
    // A (step, target) pair may appear at most once per policy.
    let mut seen_pairs: HashSet<(i32, &str)> = HashSet::new();
    for step in &body.steps {
        for target_id in &step.target_ids {
            if !seen_pairs.insert((step.step_no, target_id.as_str())) {
                return Err(BrokerError::Conflict(format!(
                    "duplicate step/target pair: step {}, target {}",
                    step.step_no, target_id
                )));
            }
        }
    }

    // Every referenced target must be declared here or already stored.
    let incoming: HashSet<&str> = body.targets.iter().map(|t| t.id.as_str()).collect();
    let referenced: Vec<String> = body
        .steps
        .iter()
        .flat_map(|s| s.target_ids.iter().cloned())
        .filter(|id| !incoming.contains(id.as_str()))
        .collect();
    if !referenced.is_empty() {
        let existing: HashSet<String> =
            state.store.existing_target_ids(&referenced).await?.into_iter().collect();
        let mut unknown: Vec<&String> =
            referenced.iter().filter(|id| !existing.contains(*id)).collect();
        unknown.sort();
        unknown.dedup();
        if !unknown.is_empty() {
            let unknown =
                unknown.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
            return Err(BrokerError::invalid_field(
                format!("Unknown escalation target ids: {unknown}"),
                "steps",
            ));
        }
    }

    state
        .store
        .upsert_policy(&EscalationPolicy { id: body.policy_id.clone(), name: body.name.clone() })
        .await?;
    for target in &body.targets {
        state
            .store
            .upsert_target(&EscalationTarget {
                id: target.id.clone(),
                label: target.label.clone(),
                channel: target.channel,
                address: target.address.clone(),
                enabled: target.enabled,
            })
            .await?;
    }

    let steps: Vec<EscalationStep> = body
        .steps
        .iter()
        .flat_map(|s| {
            let policy_id = body.policy_id.clone();
            s.target_ids.iter().map(move |target_id| EscalationStep {
                policy_id: policy_id.clone(),
                step_no: s.step_no,
                after_seconds: s.after_seconds,
                target_id: target_id.clone(),
            })
        })
        .collect();
    state.store.replace_policy_steps(&body.policy_id, &steps).await?;

    Ok(Json(serde_json::json!({"ok": "true", "policy_id": body.policy_id})))
}

/// `POST /v1/admin/seed` — JSON or YAML payload with `${VAR}` expansion.
pub async fn apply_seed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, BrokerError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    let data = seed::parse_seed(content_type, &body)?;
    seed::apply_seed(&*state.store, &data).await?;
    Ok(Json(serde_json::json!({"ok": "true"})))
}
