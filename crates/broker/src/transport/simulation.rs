// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulation-mode inspection endpoints.
//!
//! Fail closed: everything here answers 404 unless simulation mode is on,
//! so the surface is invisible in production.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use crate::channels::MockHub;
use crate::error::BrokerError;
use crate::state::AppState;

const VALID_CHANNELS: [&str; 4] = ["ticket", "sms", "group-chat", "webhook"];

fn hub_or_404(state: &AppState) -> Result<Arc<MockHub>, BrokerError> {
    if !state.config.simulation_enabled {
        return Err(BrokerError::NotFound("Simulation endpoint".to_owned()));
    }
    state
        .channels
        .hub
        .clone()
        .ok_or_else(|| BrokerError::NotFound("Simulation endpoint".to_owned()))
}

/// `GET /v1/simulation/notifications` — stored mock notifications,
/// optionally filtered by channel.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, BrokerError> {
    let hub = hub_or_404(&state)?;

    let channel = params.get("channel").map(String::as_str);
    if let Some(channel) = channel {
        if !VALID_CHANNELS.contains(&channel) {
            return Err(BrokerError::invalid_field(
                format!("Invalid channel. Must be one of: {}", VALID_CHANNELS.join(", ")),
                "channel",
            ));
        }
    }

    let notifications = match channel {
        Some(channel) => hub.by_channel(channel),
        None => hub.all(),
    };
    Ok(Json(serde_json::json!({
        "simulation_enabled": true,
        "channel_filter": channel,
        "total": notifications.len(),
        "notifications": notifications,
    })))
}

/// `POST /v1/simulation/notifications/clear`.
pub async fn clear_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, BrokerError> {
    let hub = hub_or_404(&state)?;
    hub.clear();
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "All simulation notifications cleared",
    })))
}

/// `GET /v1/simulation/status`.
pub async fn simulation_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, BrokerError> {
    let hub = hub_or_404(&state)?;
    Ok(Json(serde_json::json!({
        "simulation_enabled": true,
        "stored_notifications": hub.all().len(),
    })))
}
