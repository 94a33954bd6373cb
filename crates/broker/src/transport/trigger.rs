// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-facing trigger endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::ClientAddr;
use crate::error::BrokerError;
use crate::ipnet;
use crate::state::AppState;
use crate::store::AlarmStatus;
use crate::trigger::{process, TriggerRequest};

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub ok: bool,
    pub alarm_id: Uuid,
    pub status: AlarmStatus,
    pub duplicate: bool,
}

/// `GET /v1/yealink/alarm?token=…` — one-shot alarm trigger.
pub async fn trigger_alarm(
    State(state): State<Arc<AppState>>,
    ClientAddr(peer): ClientAddr,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<TriggerResponse>, BrokerError> {
    let token = params.get(&state.config.token_query_param).cloned().unwrap_or_default();
    let forwarded = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let client_ip = ipnet::client_ip(peer, forwarded, state.trusted_proxies.as_ref());
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let outcome = process(
        &state,
        TriggerRequest {
            token,
            client_ip,
            user_agent,
            event: params.get("event").cloned(),
            severity: params.get("severity").cloned(),
        },
    )
    .await?;

    Ok(Json(TriggerResponse {
        ok: true,
        alarm_id: outcome.alarm_id,
        status: outcome.status,
        duplicate: outcome.duplicate,
    }))
}
