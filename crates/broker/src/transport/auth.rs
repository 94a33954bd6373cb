// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin-key authentication for operator endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const ADMIN_EMAIL_HEADER: &str = "x-admin-email";

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate the admin key header. An unconfigured key fails closed with
/// 403, never 500.
pub fn require_admin(headers: &HeaderMap, config: &BrokerConfig) -> Result<(), BrokerError> {
    if config.admin_api_key.is_empty() {
        return Err(BrokerError::Forbidden("Admin key not configured on server".to_owned()));
    }
    let presented =
        headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if constant_time_eq(presented, &config.admin_api_key) {
        Ok(())
    } else {
        Err(BrokerError::Unauthenticated)
    }
}

/// Axum middleware enforcing the admin key on operator routes.
pub async fn admin_layer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    match require_admin(req.headers(), &state.config) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
