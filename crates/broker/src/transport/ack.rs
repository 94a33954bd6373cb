// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use acknowledgment channel.
//!
//! The ack token in the URL is the only authentication factor here; the
//! response layer adds no-store caching headers for everything under `/a/`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Form;
use serde::Deserialize;

use super::ackpage;
use crate::alarm;
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::notify::enrich;
use crate::queue::{Job, Queue};
use crate::state::AppState;
use crate::store::Store;

pub const MAX_ACTOR_LEN: usize = 120;
pub const MAX_NOTE_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct AckForm {
    #[serde(default)]
    pub acked_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// `GET /a/{ack_token}` — render the acknowledgment page.
pub async fn ack_page(
    State(state): State<Arc<AppState>>,
    Path(ack_token): Path<String>,
) -> Result<Html<String>, BrokerError> {
    let alarm = state
        .store
        .get_alarm_by_ack_token(&ack_token)
        .await?
        .ok_or_else(|| BrokerError::NotFound("Unknown token".to_owned()))?;

    let enriched = enrich(&*state.store, &alarm).await?;
    Ok(Html(ackpage::render(&alarm, &enriched)))
}

/// `POST /a/{ack_token}` — acknowledge the alarm; re-renders the page.
pub async fn ack_submit(
    State(state): State<Arc<AppState>>,
    Path(ack_token): Path<String>,
    Form(form): Form<AckForm>,
) -> Result<Html<String>, BrokerError> {
    let mut alarm = state
        .store
        .get_alarm_by_ack_token(&ack_token)
        .await?
        .ok_or_else(|| BrokerError::NotFound("Unknown token".to_owned()))?;

    let acked_by = super::clean_field(form.acked_by, MAX_ACTOR_LEN, "acked_by")?;
    let note = super::clean_field(form.note, MAX_NOTE_LEN, "note")?;

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
        state
            .queue
            .enqueue(Job::AlarmAcked {
                alarm_id: alarm.id,
                acked_by: acked_by.clone(),
                note: note.clone(),
            })
            .await?;
        state
            .queue
            .enqueue(Job::StateChanged { alarm_id: alarm.id, state: alarm.status })
            .await?;
        tracing::info!(alarm_id = %alarm.id, "alarm acknowledged via ack page");
    }

    let enriched = enrich(&*state.store, &alarm).await?;
    Ok(Html(ackpage::render(&alarm, &enriched)))
}
