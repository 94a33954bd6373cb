// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-cutting response layers: correlation ids, request logging, and the
//! security header set.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::metrics::Metrics;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Echo an inbound correlation id or mint one, log the request outcome, and
/// count it.
pub async fn observability_layer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let mut response = next.run(req).await;

    Metrics::incr(&state.metrics.http_requests);
    let latency_ms = start.elapsed().as_millis();
    tracing::info!(
        request_id = %request_id,
        method = %method,
        route = %path,
        status = response.status().as_u16(),
        latency_ms = latency_ms as u64,
        "request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn insert_if_absent(response: &mut Response, name: &'static str, value: &'static str) {
    let name = HeaderName::from_static(name);
    if !response.headers().contains_key(&name) {
        response.headers_mut().insert(name, HeaderValue::from_static(value));
    }
}

/// Security headers on every response; the ack page additionally gets
/// anti-caching headers because the token rides in its URL.
pub async fn security_headers_layer(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let https = req.uri().scheme_str() == Some("https")
        || req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    let mut response = next.run(req).await;

    insert_if_absent(&mut response, "x-content-type-options", "nosniff");
    insert_if_absent(&mut response, "x-frame-options", "DENY");
    insert_if_absent(&mut response, "referrer-policy", "no-referrer");
    insert_if_absent(
        &mut response,
        "permissions-policy",
        "camera=(), geolocation=(), microphone=()",
    );
    insert_if_absent(
        &mut response,
        "content-security-policy",
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'",
    );
    if https {
        insert_if_absent(
            &mut response,
            "strict-transport-security",
            "max-age=31536000; includeSubDomains",
        );
    }
    if path.starts_with("/a/") {
        response
            .headers_mut()
            .insert(HeaderName::from_static("cache-control"), HeaderValue::from_static("no-store"));
        response
            .headers_mut()
            .insert(HeaderName::from_static("pragma"), HeaderValue::from_static("no-cache"));
    }
    response
}
