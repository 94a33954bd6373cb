// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: router assembly and request-scoped helpers.

pub mod ack;
pub mod ackpage;
pub mod admin;
pub mod alarms;
pub mod auth;
pub mod health;
pub mod layers;
pub mod simulation;
pub mod trigger;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Peer address extractor that never rejects; defaults to loopback when the
/// server runs without connect info (tests).
pub struct ClientAddr(pub IpAddr);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Ok(Self(peer))
    }
}

/// Trim an optional user-supplied field, mapping blank to `None` and
/// over-length to a 422.
pub(crate) fn clean_field(
    value: Option<String>,
    max: usize,
    field: &str,
) -> Result<Option<String>, crate::error::BrokerError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > max {
                return Err(crate::error::BrokerError::unprocessable(
                    format!("{field} must be at most {max} characters"),
                    field,
                ));
            }
            Ok(Some(trimmed.to_owned()))
        }
    }
}

/// Build the axum `Router` with all broker routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        // Operator API
        .route("/v1/alarms", get(alarms::list_alarms))
        .route("/v1/alarms/stats", get(alarms::alarm_stats))
        .route("/v1/alarms/export", get(alarms::export_alarms))
        .route("/v1/alarms/bulk/ack", post(alarms::bulk_ack))
        .route("/v1/alarms/bulk/resolve", post(alarms::bulk_resolve))
        .route("/v1/alarms/bulk/cancel", post(alarms::bulk_cancel))
        .route(
            "/v1/alarms/{id}",
            get(alarms::get_alarm).patch(alarms::patch_alarm).delete(alarms::delete_alarm),
        )
        .route("/v1/alarms/{id}/ack", post(alarms::ack_alarm))
        .route("/v1/alarms/{id}/resolve", post(alarms::resolve_alarm))
        .route("/v1/alarms/{id}/cancel", post(alarms::cancel_alarm))
        .route("/v1/alarms/{id}/notes", get(alarms::list_notes).post(alarms::create_note))
        // Config mutations
        .route("/v1/admin/devices", post(admin::upsert_device))
        .route("/v1/admin/escalation-policy", post(admin::apply_policy))
        .route("/v1/admin/seed", post(admin::apply_seed))
        // Simulation surface
        .route("/v1/simulation/notifications", get(simulation::list_notifications))
        .route("/v1/simulation/notifications/clear", post(simulation::clear_notifications))
        .route("/v1/simulation/status", get(simulation::simulation_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::admin_layer));

    Router::new()
        // Device trigger
        .route("/v1/yealink/alarm", get(trigger::trigger_alarm))
        // Acknowledgment page
        .route("/a/{ack_token}", get(ack::ack_page).post(ack::ack_submit))
        // Health & metrics (no auth)
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/healthz/details", get(health::healthz_details))
        .route("/metrics", get(health::metrics))
        .merge(admin_routes)
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), layers::observability_layer))
        .layer(middleware::from_fn(layers::security_headers_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
