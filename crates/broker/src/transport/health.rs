// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness, readiness, and metrics endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::clock::Clock;
use crate::kv::Kv;
use crate::queue::Queue;
use crate::state::AppState;
use crate::store::Store;

/// `GET /healthz` — liveness only, touches no dependency.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": "true"}))
}

/// `GET /readyz` — 200 when the durable store and the KV store answer,
/// 503 otherwise.
pub async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let db_ok = state.store.ping().await.is_ok();
    let kv_ok = state.kv.ping().await.is_ok();

    let body = serde_json::json!({
        "ok": if db_ok && kv_ok { "true" } else { "false" },
        "db": if db_ok { "ok" } else { "down" },
        "kv": if kv_ok { "ok" } else { "down" },
    });
    let status = if db_ok && kv_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn probe_latency_ms<F, Fut>(probe: F) -> (bool, f64)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    let ok = probe().await;
    (ok, start.elapsed().as_secs_f64() * 1000.0)
}

/// `GET /healthz/details` — uptime, dependency latency, connector state.
pub async fn healthz_details(State(state): State<Arc<AppState>>) -> Response {
    let (db_ok, db_ms) = probe_latency_ms(|| async { state.store.ping().await.is_ok() }).await;
    let (kv_ok, kv_ms) = probe_latency_ms(|| async { state.kv.ping().await.is_ok() }).await;
    let queue_ok = state.queue.ping().await.is_ok();

    let channels = &state.channels;
    let body = serde_json::json!({
        "status": if db_ok && kv_ok { "healthy" } else { "unhealthy" },
        "application": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": (state.uptime_seconds() * 100.0).round() / 100.0,
            "timestamp": state.clock.now().to_rfc3339(),
        },
        "dependencies": {
            "database": {
                "status": if db_ok { "ok" } else { "error" },
                "latency_ms": (db_ms * 100.0).round() / 100.0,
            },
            "kv": {
                "status": if kv_ok { "ok" } else { "error" },
                "latency_ms": (kv_ms * 100.0).round() / 100.0,
            },
            "queue": {
                "status": if queue_ok { "ok" } else { "error" },
            },
        },
        "connectors": {
            "ticket": {"enabled": channels.ticket.enabled()},
            "sms": {"enabled": channels.sms.enabled()},
            "group_chat": {"enabled": channels.group_chat.enabled()},
            "webhook": {"enabled": channels.webhook.enabled()},
            "simulation": state.config.simulation_enabled,
        },
    });

    let status = if db_ok && kv_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let mut response = state.metrics.render().into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
