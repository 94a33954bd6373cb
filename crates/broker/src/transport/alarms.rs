// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator API over alarms: listing, transitions, notes, stats, export.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::ADMIN_EMAIL_HEADER;
use super::{clean_field, ack::MAX_ACTOR_LEN, ack::MAX_NOTE_LEN};
use crate::alarm;
use crate::clock::Clock;
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::queue::{Job, Queue};
use crate::state::AppState;
use crate::store::{
    Alarm, AlarmNote, AlarmQuery, AlarmStatus, NoteType, SortField, SortOrder, Store,
};
use crate::trigger::SEVERITIES;

pub const NEXT_CURSOR_HEADER: &str = "x-next-cursor";
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;
const MAX_BULK_IDS: usize = 200;
const MAX_NOTE_BODY_LEN: usize = 5000;

// -- Request/response types ---------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<AlarmStatus>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Uuid>,
    #[serde(default)]
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    /// Export only: `json` (default) or `csv`.
    #[serde(default)]
    pub format: Option<String>,
}

impl ListParams {
    fn to_query(&self) -> Result<AlarmQuery, BrokerError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit < 1 || limit > MAX_LIMIT {
            return Err(BrokerError::unprocessable(
                format!("limit must be between 1 and {MAX_LIMIT}"),
                "limit",
            ));
        }
        Ok(AlarmQuery {
            status: self.status,
            severity: self.severity.clone(),
            person_id: self.person_id.clone(),
            room_id: self.room_id.clone(),
            site_id: self.site_id.clone(),
            device_id: self.device_id.clone(),
            source: self.source.clone(),
            created_after: self.created_after,
            created_before: self.created_before,
            limit,
            cursor: self.cursor,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
            include_deleted: false,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AckIn {
    #[serde(default)]
    pub acked_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionIn {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAckIn {
    pub alarm_ids: Vec<Uuid>,
    #[serde(default)]
    pub acked_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkTransitionIn {
    pub alarm_ids: Vec<Uuid>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkOperationOut {
    pub requested: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub missing: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PatchIn {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct NoteIn {
    pub note: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

// -- Helpers ------------------------------------------------------------------

async fn get_alarm_or_404(state: &AppState, id: Uuid) -> Result<Alarm, BrokerError> {
    state
        .store
        .get_alarm(id)
        .await?
        .ok_or_else(|| BrokerError::NotFound("Alarm".to_owned()))
}

fn admin_email(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ADMIN_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

async fn enqueue_state_changed(state: &AppState, alarm: &Alarm) {
    if let Err(e) = state
        .queue
        .enqueue(Job::StateChanged { alarm_id: alarm.id, state: alarm.status })
        .await
    {
        tracing::error!(alarm_id = %alarm.id, err = %e, "enqueueing state_changed failed");
    }
}

async fn enqueue_acked(
    state: &AppState,
    alarm: &Alarm,
    acked_by: Option<&str>,
    note: Option<&str>,
) {
    if let Err(e) = state
        .queue
        .enqueue(Job::AlarmAcked {
            alarm_id: alarm.id,
            acked_by: acked_by.map(str::to_owned),
            note: note.map(str::to_owned),
        })
        .await
    {
        tracing::error!(alarm_id = %alarm.id, err = %e, "enqueueing alarm_acked failed");
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /v1/alarms` — filters, sort, cursor pagination.
pub async fn list_alarms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Response, BrokerError> {
    let query = params.to_query()?;
    let mut page = state.store.list_alarms(&query).await?;

    let has_more = page.len() > query.limit;
    page.truncate(query.limit);

    let mut response = Json(&page).into_response();
    if has_more {
        if let Some(last) = page.last() {
            if let Ok(value) = HeaderValue::from_str(&last.id.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(NEXT_CURSOR_HEADER), value);
            }
        }
    }
    Ok(response)
}

/// `GET /v1/alarms/stats` — aggregate counts.
pub async fn alarm_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BrokerError> {
    Ok(Json(state.store.alarm_stats().await?))
}

/// `GET /v1/alarms/{id}`.
pub async fn get_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BrokerError> {
    Ok(Json(get_alarm_or_404(&state, id).await?))
}

/// `PATCH /v1/alarms/{id}` — severity plus meta-carried fields. Null fields
/// are ignored; meta merges.
pub async fn patch_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchIn>,
) -> Result<impl IntoResponse, BrokerError> {
    let mut alarm = get_alarm_or_404(&state, id).await?;

    if let Some(ref severity) = body.severity {
        if !SEVERITIES.contains(&severity.as_str()) {
            return Err(BrokerError::invalid_field(
                format!("Unknown severity '{severity}'"),
                "severity",
            ));
        }
        alarm.severity = severity.clone();
        alarm.silent = severity == "P0";
    }
    if let Some(title) = clean_field(body.title, MAX_ACTOR_LEN, "title")? {
        alarm.merge_meta("title", serde_json::Value::String(title));
    }
    if let Some(description) = clean_field(body.description, MAX_NOTE_LEN, "description")? {
        alarm.merge_meta("description", serde_json::Value::String(description));
    }
    if let Some(tags) = body.tags {
        alarm.merge_meta("tags", serde_json::json!(tags));
    }

    state.store.update_alarm(&alarm).await?;
    Ok(Json(alarm))
}

/// `DELETE /v1/alarms/{id}` — soft delete.
pub async fn delete_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, BrokerError> {
    let mut alarm = get_alarm_or_404(&state, id).await?;
    let actor = admin_email(&headers).unwrap_or_else(|| "admin".to_owned());
    alarm::soft_delete(&*state.store, &*state.clock, &mut alarm, Some(&actor)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/alarms/{id}/ack`.
pub async fn ack_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AckIn>,
) -> Result<StatusCode, BrokerError> {
    let mut alarm = get_alarm_or_404(&state, id).await?;
    let acked_by = clean_field(body.acked_by, MAX_ACTOR_LEN, "acked_by")?;
    let note = clean_field(body.note, MAX_NOTE_LEN, "note")?;

    let changed = alarm::acknowledge(
        &*state.store,
        &*state.clock,
        &mut alarm,
        acked_by.as_deref(),
        note.as_deref(),
    )
    .await?;

    if changed {
        Metrics::incr(&state.metrics.alarms_acknowledged);
        enqueue_acked(&state, &alarm, acked_by.as_deref(), note.as_deref()).await;
        enqueue_state_changed(&state, &alarm).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn transition_alarm(
    state: &AppState,
    id: Uuid,
    target: AlarmStatus,
    actor: Option<String>,
    note: Option<String>,
) -> Result<StatusCode, BrokerError> {
    let mut alarm = get_alarm_or_404(state, id).await?;
    let actor = clean_field(actor, MAX_ACTOR_LEN, "actor")?;
    let note = clean_field(note, MAX_NOTE_LEN, "note")?;

    let changed = alarm::transition(
        &*state.store,
        &*state.clock,
        &mut alarm,
        target,
        actor.as_deref(),
        note.as_deref(),
    )
    .await?;

    if changed {
        enqueue_state_changed(state, &alarm).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/alarms/{id}/resolve`.
pub async fn resolve_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionIn>,
) -> Result<StatusCode, BrokerError> {
    transition_alarm(&state, id, AlarmStatus::Resolved, body.actor, body.note).await
}

/// `POST /v1/alarms/{id}/cancel`.
pub async fn cancel_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionIn>,
) -> Result<StatusCode, BrokerError> {
    transition_alarm(&state, id, AlarmStatus::Cancelled, body.actor, body.note).await
}

async fn bulk_transition(
    state: &AppState,
    alarm_ids: Vec<Uuid>,
    target: AlarmStatus,
    actor: Option<String>,
    note: Option<String>,
) -> Result<Json<BulkOperationOut>, BrokerError> {
    if alarm_ids.len() > MAX_BULK_IDS {
        return Err(BrokerError::unprocessable(
            format!("at most {MAX_BULK_IDS} alarm ids per request"),
            "alarm_ids",
        ));
    }
    let actor = clean_field(actor, MAX_ACTOR_LEN, "actor")?;
    let note = clean_field(note, MAX_NOTE_LEN, "note")?;

    let found = state.store.get_alarms(&alarm_ids).await?;
    let mut by_id: HashMap<Uuid, Alarm> = found.into_iter().map(|a| (a.id, a)).collect();

    let requested = alarm_ids.len();
    let mut changed = 0usize;
    let mut unchanged = 0usize;
    let mut missing = Vec::new();

    for alarm_id in alarm_ids {
        let Some(alarm) = by_id.get_mut(&alarm_id) else {
            missing.push(alarm_id);
            continue;
        };

        let outcome = if target == AlarmStatus::Acknowledged {
            alarm::acknowledge(
                &*state.store,
                &*state.clock,
                alarm,
                actor.as_deref(),
                note.as_deref(),
            )
            .await
        } else {
            alarm::transition(
                &*state.store,
                &*state.clock,
                alarm,
                target,
                actor.as_deref(),
                note.as_deref(),
            )
            .await
        };

        match outcome {
            Ok(true) => {
                changed += 1;
                if target == AlarmStatus::Acknowledged {
                    Metrics::incr(&state.metrics.alarms_acknowledged);
                    enqueue_acked(state, alarm, actor.as_deref(), note.as_deref()).await;
                }
                enqueue_state_changed(state, alarm).await;
            }
            Ok(false) => unchanged += 1,
            // A forbidden transition is not an error in bulk.
            Err(BrokerError::Conflict(_)) => unchanged += 1,
            Err(e) => return Err(e),
        }
    }

    Ok(Json(BulkOperationOut { requested, changed, unchanged, missing }))
}

/// `POST /v1/alarms/bulk/ack`.
pub async fn bulk_ack(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkAckIn>,
) -> Result<Json<BulkOperationOut>, BrokerError> {
    bulk_transition(&state, body.alarm_ids, AlarmStatus::Acknowledged, body.acked_by, body.note)
        .await
}

/// `POST /v1/alarms/bulk/resolve`.
pub async fn bulk_resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkTransitionIn>,
) -> Result<Json<BulkOperationOut>, BrokerError> {
    bulk_transition(&state, body.alarm_ids, AlarmStatus::Resolved, body.actor, body.note).await
}

/// `POST /v1/alarms/bulk/cancel`.
pub async fn bulk_cancel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkTransitionIn>,
) -> Result<Json<BulkOperationOut>, BrokerError> {
    bulk_transition(&state, body.alarm_ids, AlarmStatus::Cancelled, body.actor, body.note).await
}

/// `GET /v1/alarms/{id}/notes` — creation time ascending.
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BrokerError> {
    get_alarm_or_404(&state, id).await?;
    Ok(Json(state.store.list_notes(id).await?))
}

/// `POST /v1/alarms/{id}/notes` — creator falls back body → admin email
/// header → "admin".
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<NoteIn>,
) -> Result<impl IntoResponse, BrokerError> {
    get_alarm_or_404(&state, id).await?;

    let text = body.note.trim().to_owned();
    if text.is_empty() {
        return Err(BrokerError::unprocessable("note must not be empty", "note"));
    }
    if text.chars().count() > MAX_NOTE_BODY_LEN {
        return Err(BrokerError::unprocessable(
            format!("note must be at most {MAX_NOTE_BODY_LEN} characters"),
            "note",
        ));
    }
    let created_by = clean_field(body.created_by, MAX_ACTOR_LEN, "created_by")?
        .or_else(|| admin_email(&headers))
        .unwrap_or_else(|| "admin".to_owned());

    let note = AlarmNote {
        id: Uuid::new_v4(),
        alarm_id: id,
        created_at: state.clock.now(),
        created_by: Some(created_by),
        note: text,
        note_type: NoteType::Manual,
    };
    state.store.insert_note(&note).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `GET /v1/alarms/export` — stream the full filtered set as JSON or CSV.
pub async fn export_alarms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Response, BrokerError> {
    let format = params.format.as_deref().unwrap_or("json");
    if format != "json" && format != "csv" {
        return Err(BrokerError::invalid_field(
            format!("Unknown export format '{format}'"),
            "format",
        ));
    }

    // Walk the cursor internally so exports reuse the exact list semantics.
    let mut query = params.to_query()?;
    query.limit = MAX_LIMIT;
    query.cursor = None;

    let mut rows: Vec<Alarm> = Vec::new();
    loop {
        let mut page = state.store.list_alarms(&query).await?;
        let has_more = page.len() > query.limit;
        page.truncate(query.limit);
        query.cursor = page.last().map(|a| a.id);
        rows.extend(page);
        if !has_more {
            break;
        }
    }

    let date = state.clock.now().format("%Y%m%d");
    let (body, content_type, filename) = match format {
        "csv" => (render_csv(&rows)?, "text/csv", format!("alarms-{date}.csv")),
        _ => (
            serde_json::to_vec(&rows)
                .map_err(|e| BrokerError::Configuration(e.to_string()))?,
            "application/json",
            format!("alarms-{date}.json"),
        ),
    };

    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={filename}")) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

const CSV_COLUMNS: [&str; 18] = [
    "id",
    "status",
    "source",
    "event",
    "created_at",
    "person_id",
    "room_id",
    "site_id",
    "device_id",
    "severity",
    "silent",
    "ticket_id",
    "acked_at",
    "acked_by",
    "resolved_at",
    "resolved_by",
    "cancelled_at",
    "cancelled_by",
];

fn render_csv(rows: &[Alarm]) -> Result<Vec<u8>, BrokerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|e| BrokerError::Configuration(e.to_string()))?;

    let time = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
    let text = |s: &Option<String>| s.clone().unwrap_or_default();

    for alarm in rows {
        writer
            .write_record([
                alarm.id.to_string(),
                alarm.status.as_str().to_owned(),
                alarm.source.clone(),
                alarm.event.clone(),
                alarm.created_at.to_rfc3339(),
                text(&alarm.person_id),
                text(&alarm.room_id),
                text(&alarm.site_id),
                text(&alarm.device_id),
                alarm.severity.clone(),
                alarm.silent.to_string(),
                alarm.ticket_id.map(|t| t.to_string()).unwrap_or_default(),
                time(alarm.acked_at),
                text(&alarm.acked_by),
                time(alarm.resolved_at),
                text(&alarm.resolved_by),
                time(alarm.cancelled_at),
                text(&alarm.cancelled_by),
            ])
            .map_err(|e| BrokerError::Configuration(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| BrokerError::Configuration(e.to_string()))
}
