// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger pipeline: the device-facing ingress state machine.
//!
//! Idempotent within a 10-second bucket, rate limited per device token and
//! minute, and careful about ordering: idempotency is consulted before the
//! rate limit so retries are not double-counted, and the IP policy runs
//! before the rate limit so an attacker cannot spend a victim's quota.

use std::net::IpAddr;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::{hex_encode, new_ack_token, token_digest, token_digest_prefix, Clock};
use crate::error::BrokerError;
use crate::kv::Kv;
use crate::metrics::Metrics;
use crate::queue::Queue;
use crate::state::AppState;
use crate::store::{Alarm, AlarmStatus, Store};

const RESERVATION_TTL: Duration = Duration::from_secs(30);
const RATE_WINDOW_TTL: Duration = Duration::from_secs(70);
const RESERVATION_ATTEMPTS: usize = 3;

pub const SEVERITIES: [&str; 4] = ["P0", "P1", "P2", "P3"];

/// Integer 10-second bucket used for trigger idempotency.
pub fn bucket_10s(epoch_seconds: i64) -> i64 {
    epoch_seconds.div_euclid(10)
}

/// Integer minute bucket used for rate limiting.
pub fn minute_bucket(epoch_seconds: i64) -> i64 {
    epoch_seconds.div_euclid(60)
}

/// Stable hash of (token, bucket). The raw token never becomes a key.
pub fn idempotency_key(token: &str, bucket: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(b":");
    hasher.update(bucket.to_string().as_bytes());
    format!("idemp:{}", hex_encode(&hasher.finalize()))
}

/// Rate counter key for (token, minute bucket).
pub fn rate_limit_key(token: &str, bucket: i64) -> String {
    format!("rl:{}:{bucket}", token_digest(token))
}

/// One inbound trigger request, already stripped of transport detail.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub token: String,
    pub client_ip: IpAddr,
    pub user_agent: String,
    pub event: Option<String>,
    pub severity: Option<String>,
}

/// Pipeline outcome returned to the device.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub alarm_id: Uuid,
    pub status: AlarmStatus,
    pub duplicate: bool,
}

pub async fn process(state: &AppState, req: TriggerRequest) -> Result<TriggerOutcome, BrokerError> {
    // 1. Shape validation, before any KV or DB traffic.
    let token = req.token.trim();
    if token.is_empty() {
        return Err(BrokerError::invalid_field("Missing token", "token"));
    }
    let severity = match req.severity.as_deref() {
        None => "P0",
        Some(s) if SEVERITIES.contains(&s) => s,
        Some(other) => {
            return Err(BrokerError::invalid_field(
                format!("Unknown severity '{other}'"),
                "severity",
            ))
        }
    };

    let epoch = state.clock.epoch_seconds();
    let bucket = bucket_10s(epoch);
    let idem_key = idempotency_key(token, bucket);

    // 2. Idempotency lookup.
    if let Some(raw) = state.kv.get(&idem_key).await? {
        match raw.parse::<Uuid>() {
            Ok(existing_id) => {
                if let Some(existing) = state.store.get_alarm(existing_id).await? {
                    tracing::info!(
                        alarm_id = %existing.id,
                        token = %token_digest_prefix(token),
                        "trigger deduplicated within idempotency window"
                    );
                    Metrics::incr(&state.metrics.alarms_deduplicated);
                    return Ok(TriggerOutcome {
                        alarm_id: existing.id,
                        status: existing.status,
                        duplicate: true,
                    });
                }
                // Reservation without an alarm behind it: stale, clear it.
                state.kv.delete(&idem_key).await?;
            }
            Err(_) => {
                state.kv.delete(&idem_key).await?;
            }
        }
    }

    // 3. Reserve a fresh alarm id. On a lost race, re-read so the
    //    concurrent winner can be observed.
    let mut reserved: Option<Uuid> = None;
    for _ in 0..RESERVATION_ATTEMPTS {
        let candidate = crate::clock::new_alarm_id();
        if state.kv.set_nx(&idem_key, &candidate.to_string(), RESERVATION_TTL).await? {
            reserved = Some(candidate);
            break;
        }
        if let Some(raw) = state.kv.get(&idem_key).await? {
            if let Ok(winner_id) = raw.parse::<Uuid>() {
                if let Some(existing) = state.store.get_alarm(winner_id).await? {
                    Metrics::incr(&state.metrics.alarms_deduplicated);
                    return Ok(TriggerOutcome {
                        alarm_id: existing.id,
                        status: existing.status,
                        duplicate: true,
                    });
                }
            }
        }
    }
    let Some(alarm_id) = reserved else {
        tracing::error!(
            token = %token_digest_prefix(token),
            "idempotency reservation failed after retries"
        );
        return Err(BrokerError::Transient("idempotency reservation failed".to_owned()));
    };

    // 4. IP policy. Simulation mode bypasses the allowlist.
    if !state.config.simulation_enabled {
        if let Some(ref allowlist) = state.device_allowlist {
            if !allowlist.contains(req.client_ip) {
                state.kv.delete(&idem_key).await?;
                tracing::warn!(client_ip = %req.client_ip, "trigger from disallowed address");
                return Err(BrokerError::Forbidden("IP not allowed".to_owned()));
            }
        }
    }

    // 5. Rate limit on the minute bucket.
    if !state.config.simulation_enabled {
        let rate_key = rate_limit_key(token, minute_bucket(epoch));
        let count = state.kv.incr(&rate_key).await?;
        if count == 1 {
            state.kv.expire(&rate_key, RATE_WINDOW_TTL).await?;
        }
        if count > i64::from(state.config.rate_limit_per_minute) {
            state.kv.delete(&idem_key).await?;
            Metrics::incr(&state.metrics.alarms_rate_limited);
            tracing::warn!(
                token = %token_digest_prefix(token),
                limit = state.config.rate_limit_per_minute,
                "trigger rate limit exceeded"
            );
            return Err(BrokerError::RateLimited);
        }
    }

    // 6. Device resolution, last because it costs a DB read.
    let device = match state.store.get_device_by_token(token).await? {
        Some(device) => device,
        None => {
            state.kv.delete(&idem_key).await?;
            return Err(BrokerError::NotFound("Unknown token".to_owned()));
        }
    };
    if !device.is_bound() {
        state.kv.delete(&idem_key).await?;
        return Err(BrokerError::Conflict("Device mapping incomplete".to_owned()));
    }

    // 7. Create the alarm.
    let site_id = match device.room_id.as_deref() {
        Some(room_id) => state.store.get_room(room_id).await?.map(|r| r.site_id),
        None => None,
    };
    let now = state.clock.now();
    let alarm = Alarm {
        id: alarm_id,
        status: AlarmStatus::Triggered,
        source: "yealink".to_owned(),
        event: req.event.clone().unwrap_or_else(|| "alarm.trigger".to_owned()),
        created_at: now,
        person_id: device.person_id.clone(),
        room_id: device.room_id.clone(),
        site_id,
        device_id: Some(device.id.clone()),
        severity: severity.to_owned(),
        silent: severity == "P0",
        ticket_id: None,
        ack_token: Some(new_ack_token()),
        acked_at: None,
        acked_by: None,
        resolved_at: None,
        resolved_by: None,
        cancelled_at: None,
        cancelled_by: None,
        deleted_at: None,
        deleted_by: None,
        meta: serde_json::json!({
            "received_at": now.to_rfc3339(),
            "client_ip": req.client_ip.to_string(),
            "user_agent": req.user_agent,
            "idempotency": {"bucket": bucket, "key": idem_key},
        }),
    };

    if let Err(e) = state.store.create_alarm(&alarm).await {
        // Release the reservation so a retry can succeed.
        state.kv.delete(&idem_key).await?;
        return Err(e.into());
    }

    // 8. Emit the created event.
    state
        .queue
        .enqueue(crate::queue::Job::AlarmCreated { alarm_id: alarm.id })
        .await
        .unwrap_or_else(|e| {
            tracing::error!(alarm_id = %alarm.id, err = %e, "enqueueing alarm_created failed");
        });

    Metrics::incr(&state.metrics.alarms_triggered);
    tracing::info!(
        alarm_id = %alarm.id,
        device_id = %device.id,
        person_id = device.person_id.as_deref().unwrap_or("-"),
        room_id = device.room_id.as_deref().unwrap_or("-"),
        "alarm triggered"
    );

    Ok(TriggerOutcome { alarm_id: alarm.id, status: alarm.status, duplicate: false })
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
