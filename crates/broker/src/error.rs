// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the broker API.
//!
//! Connector and configuration failures are logged with full detail but
//! surface to clients as generic messages; everything else is returned as a
//! structured `{error, details?, field?}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Shape or range violation in client input. 400.
    #[error("{message}")]
    InvalidInput { message: String, field: Option<String> },

    /// Schema-level violation (field too long, malformed body). 422.
    #[error("{message}")]
    Unprocessable { message: String, field: Option<String> },

    /// Unknown id or token. 404.
    #[error("{0} not found")]
    NotFound(String),

    /// Forbidden state transition, double delete, duplicate upsert. 409.
    #[error("{0}")]
    Conflict(String),

    /// Missing or wrong admin key. 401.
    #[error("invalid admin key")]
    Unauthenticated,

    /// IP not allowed, or admin auth not configured server-side. 403.
    #[error("{0}")]
    Forbidden(String),

    /// Per-token rate limit exceeded. 429.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Downstream channel failed after retries. Logged, surfaced as 502.
    #[error("{connector} error during {operation}: {detail}")]
    Connector { connector: &'static str, operation: &'static str, detail: String },

    /// Server-side misconfiguration. Logged, surfaced as generic 500.
    #[error("{0}")]
    Configuration(String),

    /// KV/DB/queue momentarily unavailable. 503.
    #[error("{0}")]
    Transient(String),
}

impl BrokerError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into(), field: None }
    }

    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into(), field: Some(field.into()) }
    }

    pub fn unprocessable(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Unprocessable { message: message.into(), field: Some(field.into()) }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Connector { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Wire body for surfaced errors.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Connector { connector, operation, detail } => {
                tracing::error!(connector, operation, detail = %detail, "connector error");
                ErrorBody { error: "External service error".to_owned(), details: None, field: None }
            }
            Self::Configuration(detail) => {
                tracing::error!(detail = %detail, "configuration error");
                ErrorBody {
                    error: "Internal configuration error".to_owned(),
                    details: None,
                    field: None,
                }
            }
            Self::Transient(detail) => {
                tracing::warn!(detail = %detail, "dependency unavailable");
                ErrorBody { error: "Dependency unavailable".to_owned(), details: None, field: None }
            }
            Self::InvalidInput { message, field } | Self::Unprocessable { message, field } => {
                ErrorBody { error: message, details: None, field }
            }
            other => ErrorBody { error: other.to_string(), details: None, field: None },
        };
        (status, Json(body)).into_response()
    }
}

impl From<crate::kv::KvError> for BrokerError {
    fn from(err: crate::kv::KvError) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<crate::queue::QueueError> for BrokerError {
    fn from(err: crate::queue::QueueError) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<crate::store::StoreError> for BrokerError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::Transient(err.to_string())
    }
}
