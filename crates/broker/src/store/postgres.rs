// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed [`Store`] implementation.
//!
//! Runtime (non-macro) queries; enums travel as text. The schema is applied
//! idempotently at startup so a fresh database is usable without external
//! migration tooling.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use super::{
    Alarm, AlarmNote, AlarmNotification, AlarmQuery, AlarmStats, AlarmStatus, ChannelKind, Device,
    DispatchResult, EscalationPolicy, EscalationStep, EscalationTarget, NoteType, Person, Room,
    Site, SortField, SortOrder, Store, StoreError,
};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_status(raw: &str) -> Result<AlarmStatus, StoreError> {
    AlarmStatus::parse(raw)
        .ok_or_else(|| StoreError::Database(format!("unknown alarm status '{raw}'")))
}

fn parse_channel(raw: &str) -> Result<ChannelKind, StoreError> {
    ChannelKind::parse(raw)
        .ok_or_else(|| StoreError::Database(format!("unknown channel tag '{raw}'")))
}

fn alarm_from_row(row: &PgRow) -> Result<Alarm, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Alarm {
        id: row.try_get("id")?,
        status: parse_status(&status)?,
        source: row.try_get("source")?,
        event: row.try_get("event")?,
        created_at: row.try_get("created_at")?,
        person_id: row.try_get("person_id")?,
        room_id: row.try_get("room_id")?,
        site_id: row.try_get("site_id")?,
        device_id: row.try_get("device_id")?,
        severity: row.try_get("severity")?,
        silent: row.try_get("silent")?,
        ticket_id: row.try_get("ticket_id")?,
        ack_token: row.try_get("ack_token")?,
        acked_at: row.try_get("acked_at")?,
        acked_by: row.try_get("acked_by")?,
        resolved_at: row.try_get("resolved_at")?,
        resolved_by: row.try_get("resolved_by")?,
        cancelled_at: row.try_get("cancelled_at")?,
        cancelled_by: row.try_get("cancelled_by")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: row.try_get("deleted_by")?,
        meta: row.try_get("meta")?,
    })
}

fn device_from_row(row: &PgRow) -> Result<Device, StoreError> {
    Ok(Device {
        id: row.try_get("id")?,
        vendor: row.try_get("vendor")?,
        model_family: row.try_get("model_family")?,
        mac: row.try_get("mac")?,
        account_ext: row.try_get("account_ext")?,
        device_token: row.try_get("device_token")?,
        person_id: row.try_get("person_id")?,
        room_id: row.try_get("room_id")?,
        last_seen_at: row.try_get("last_seen_at")?,
    })
}

fn target_from_row(row: &PgRow) -> Result<EscalationTarget, StoreError> {
    let channel: String = row.try_get("channel")?;
    Ok(EscalationTarget {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        channel: parse_channel(&channel)?,
        address: row.try_get("address")?,
        enabled: row.try_get("enabled")?,
    })
}

const ALARM_COLUMNS: &str = "id, status, source, event, created_at, person_id, room_id, site_id, \
     device_id, severity, silent, ticket_id, ack_token, acked_at, acked_by, resolved_at, \
     resolved_by, cancelled_at, cancelled_by, deleted_at, deleted_by, meta";

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::Status => "status",
        SortField::Severity => "severity",
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_site(&self, site: &Site) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sites (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(&site.id)
        .bind(&site.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_site(&self, id: &str) -> Result<Option<Site>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(Site { id: r.try_get("id")?, name: r.try_get("name")? })
        })
        .transpose()
    }

    async fn upsert_room(&self, room: &Room) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rooms (id, site_id, label, floor, notes) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
               site_id = EXCLUDED.site_id, label = EXCLUDED.label,
               floor = EXCLUDED.floor, notes = EXCLUDED.notes",
        )
        .bind(&room.id)
        .bind(&room.site_id)
        .bind(&room.label)
        .bind(&room.floor)
        .bind(&room.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query("SELECT id, site_id, label, floor, notes FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(Room {
                id: r.try_get("id")?,
                site_id: r.try_get("site_id")?,
                label: r.try_get("label")?,
                floor: r.try_get("floor")?,
                notes: r.try_get("notes")?,
            })
        })
        .transpose()
    }

    async fn upsert_person(&self, person: &Person) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO persons (id, display_name, role, phone_mobile, phone_ext, active)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
               display_name = EXCLUDED.display_name, role = EXCLUDED.role,
               phone_mobile = EXCLUDED.phone_mobile, phone_ext = EXCLUDED.phone_ext,
               active = EXCLUDED.active",
        )
        .bind(&person.id)
        .bind(&person.display_name)
        .bind(&person.role)
        .bind(&person.phone_mobile)
        .bind(&person.phone_ext)
        .bind(person.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_person(&self, id: &str) -> Result<Option<Person>, StoreError> {
        let row = sqlx::query(
            "SELECT id, display_name, role, phone_mobile, phone_ext, active
             FROM persons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(Person {
                id: r.try_get("id")?,
                display_name: r.try_get("display_name")?,
                role: r.try_get("role")?,
                phone_mobile: r.try_get("phone_mobile")?,
                phone_ext: r.try_get("phone_ext")?,
                active: r.try_get("active")?,
            })
        })
        .transpose()
    }

    async fn upsert_device(&self, device: &Device) -> Result<Device, StoreError> {
        // Devices are keyed by device_token; the row id never changes once
        // created so alarm FKs stay valid.
        let existing = self.get_device_by_token(&device.device_token).await?;
        match existing {
            Some(current) => {
                sqlx::query(
                    "UPDATE devices SET vendor = $1, model_family = $2, mac = $3,
                       account_ext = $4, person_id = $5, room_id = $6
                     WHERE device_token = $7",
                )
                .bind(&device.vendor)
                .bind(&device.model_family)
                .bind(&device.mac)
                .bind(&device.account_ext)
                .bind(&device.person_id)
                .bind(&device.room_id)
                .bind(&device.device_token)
                .execute(&self.pool)
                .await?;
                Ok(Device {
                    id: current.id,
                    last_seen_at: current.last_seen_at,
                    ..device.clone()
                })
            }
            None => {
                sqlx::query(
                    "INSERT INTO devices
                       (id, vendor, model_family, mac, account_ext, device_token,
                        person_id, room_id, last_seen_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)",
                )
                .bind(&device.id)
                .bind(&device.vendor)
                .bind(&device.model_family)
                .bind(&device.mac)
                .bind(&device.account_ext)
                .bind(&device.device_token)
                .bind(&device.person_id)
                .bind(&device.room_id)
                .execute(&self.pool)
                .await?;
                Ok(device.clone())
            }
        }
    }

    async fn get_device_by_token(&self, token: &str) -> Result<Option<Device>, StoreError> {
        let row = sqlx::query(
            "SELECT id, vendor, model_family, mac, account_ext, device_token,
                    person_id, room_id, last_seen_at
             FROM devices WHERE device_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| device_from_row(&r)).transpose()
    }

    async fn upsert_target(&self, target: &EscalationTarget) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO escalation_targets (id, label, channel, address, enabled)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
               label = EXCLUDED.label, channel = EXCLUDED.channel,
               address = EXCLUDED.address, enabled = EXCLUDED.enabled",
        )
        .bind(&target.id)
        .bind(&target.label)
        .bind(target.channel.as_str())
        .bind(&target.address)
        .bind(target.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_target(&self, id: &str) -> Result<Option<EscalationTarget>, StoreError> {
        let row = sqlx::query(
            "SELECT id, label, channel, address, enabled FROM escalation_targets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| target_from_row(&r)).transpose()
    }

    async fn upsert_policy(&self, policy: &EscalationPolicy) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO escalation_policy (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(&policy.id)
        .bind(&policy.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_policy_steps(
        &self,
        policy_id: &str,
        steps: &[EscalationStep],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM escalation_steps WHERE policy_id = $1")
            .bind(policy_id)
            .execute(&mut *tx)
            .await?;
        for step in steps {
            sqlx::query(
                "INSERT INTO escalation_steps (policy_id, step_no, after_seconds, target_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&step.policy_id)
            .bind(step.step_no)
            .bind(step.after_seconds)
            .bind(&step.target_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn steps_with_targets(
        &self,
        policy_id: &str,
        step_no: i32,
    ) -> Result<Vec<(EscalationStep, EscalationTarget)>, StoreError> {
        let rows = sqlx::query(
            "SELECT s.policy_id, s.step_no, s.after_seconds, s.target_id,
                    t.id, t.label, t.channel, t.address, t.enabled
             FROM escalation_steps s
             JOIN escalation_targets t ON t.id = s.target_id
             WHERE s.policy_id = $1 AND s.step_no = $2
             ORDER BY s.target_id",
        )
        .bind(policy_id)
        .bind(step_no)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let step = EscalationStep {
                policy_id: row.try_get("policy_id")?,
                step_no: row.try_get("step_no")?,
                after_seconds: row.try_get("after_seconds")?,
                target_id: row.try_get("target_id")?,
            };
            out.push((step, target_from_row(&row)?));
        }
        Ok(out)
    }

    async fn deferred_steps(&self, policy_id: &str) -> Result<Vec<(i32, i64)>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT step_no, after_seconds FROM escalation_steps
             WHERE policy_id = $1 AND step_no > 0
             ORDER BY step_no, after_seconds",
        )
        .bind(policy_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Ok((r.try_get::<i32, _>("step_no")?, r.try_get::<i64, _>("after_seconds")?)))
            .collect()
    }

    async fn existing_target_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT id FROM escalation_targets WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|r| Ok(r.try_get("id")?)).collect()
    }

    async fn create_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "INSERT INTO alarms ({ALARM_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     $17, $18, $19, $20, $21, $22)"
        ))
        .bind(alarm.id)
        .bind(alarm.status.as_str())
        .bind(&alarm.source)
        .bind(&alarm.event)
        .bind(alarm.created_at)
        .bind(&alarm.person_id)
        .bind(&alarm.room_id)
        .bind(&alarm.site_id)
        .bind(&alarm.device_id)
        .bind(&alarm.severity)
        .bind(alarm.silent)
        .bind(alarm.ticket_id)
        .bind(&alarm.ack_token)
        .bind(alarm.acked_at)
        .bind(&alarm.acked_by)
        .bind(alarm.resolved_at)
        .bind(&alarm.resolved_by)
        .bind(alarm.cancelled_at)
        .bind(&alarm.cancelled_by)
        .bind(alarm.deleted_at)
        .bind(&alarm.deleted_by)
        .bind(&alarm.meta)
        .execute(&mut *tx)
        .await?;

        if let Some(ref device_id) = alarm.device_id {
            sqlx::query("UPDATE devices SET last_seen_at = $1 WHERE id = $2")
                .bind(alarm.created_at)
                .bind(device_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_alarm(&self, id: Uuid) -> Result<Option<Alarm>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| alarm_from_row(&r)).transpose()
    }

    async fn get_alarms(&self, ids: &[Uuid]) -> Result<Vec<Alarm>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(alarm_from_row).collect()
    }

    async fn get_alarm_by_ack_token(&self, token: &str) -> Result<Option<Alarm>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE ack_token = $1"))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| alarm_from_row(&r)).transpose()
    }

    async fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE alarms SET
               status = $2, severity = $3, silent = $4, ticket_id = $5,
               acked_at = $6, acked_by = $7, resolved_at = $8, resolved_by = $9,
               cancelled_at = $10, cancelled_by = $11, deleted_at = $12, deleted_by = $13,
               meta = $14
             WHERE id = $1",
        )
        .bind(alarm.id)
        .bind(alarm.status.as_str())
        .bind(&alarm.severity)
        .bind(alarm.silent)
        .bind(alarm.ticket_id)
        .bind(alarm.acked_at)
        .bind(&alarm.acked_by)
        .bind(alarm.resolved_at)
        .bind(&alarm.resolved_by)
        .bind(alarm.cancelled_at)
        .bind(&alarm.cancelled_by)
        .bind(alarm.deleted_at)
        .bind(&alarm.deleted_by)
        .bind(&alarm.meta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_ticket_id(&self, alarm_id: Uuid, ticket_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE alarms SET ticket_id = $2 WHERE id = $1")
            .bind(alarm_id)
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_alarms(&self, query: &AlarmQuery) -> Result<Vec<Alarm>, StoreError> {
        let cursor = match query.cursor {
            Some(id) => self.get_alarm(id).await?,
            None => None,
        };

        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE 1=1"));

        if !query.include_deleted {
            qb.push(" AND deleted_at IS NULL");
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(ref severity) = query.severity {
            qb.push(" AND severity = ").push_bind(severity.clone());
        }
        if let Some(ref person_id) = query.person_id {
            qb.push(" AND person_id = ").push_bind(person_id.clone());
        }
        if let Some(ref room_id) = query.room_id {
            qb.push(" AND room_id = ").push_bind(room_id.clone());
        }
        if let Some(ref site_id) = query.site_id {
            qb.push(" AND site_id = ").push_bind(site_id.clone());
        }
        if let Some(ref device_id) = query.device_id {
            qb.push(" AND device_id = ").push_bind(device_id.clone());
        }
        if let Some(ref source) = query.source {
            qb.push(" AND source = ").push_bind(source.clone());
        }
        if let Some(after) = query.created_after {
            qb.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = query.created_before {
            qb.push(" AND created_at <= ").push_bind(before);
        }

        let col = sort_column(query.sort_by);
        if let Some(cursor) = cursor {
            let op = match query.sort_order {
                SortOrder::Desc => "<",
                SortOrder::Asc => ">",
            };
            qb.push(format!(" AND ({col}, id) {op} ("));
            match query.sort_by {
                SortField::CreatedAt => {
                    qb.push_bind(cursor.created_at);
                }
                SortField::Status => {
                    qb.push_bind(cursor.status.as_str());
                }
                SortField::Severity => {
                    qb.push_bind(cursor.severity.clone());
                }
            }
            qb.push(", ").push_bind(cursor.id).push(")");
        }

        let dir = match query.sort_order {
            SortOrder::Desc => "DESC",
            SortOrder::Asc => "ASC",
        };
        qb.push(format!(" ORDER BY {col} {dir}, id {dir} LIMIT "));
        qb.push_bind((query.limit + 1) as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(alarm_from_row).collect()
    }

    async fn alarm_stats(&self) -> Result<AlarmStats, StoreError> {
        let mut stats = AlarmStats::default();

        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM alarms WHERE deleted_at IS NULL GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            stats.by_status.insert(status, n as u64);
            stats.total += n as u64;
        }

        let rows = sqlx::query(
            "SELECT severity, COUNT(*) AS n FROM alarms WHERE deleted_at IS NULL GROUP BY severity",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let severity: String = row.try_get("severity")?;
            let n: i64 = row.try_get("n")?;
            stats.by_severity.insert(severity, n as u64);
        }
        Ok(stats)
    }

    async fn insert_note(&self, note: &AlarmNote) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alarm_notes (id, alarm_id, created_at, created_by, note, note_type)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(note.id)
        .bind(note.alarm_id)
        .bind(note.created_at)
        .bind(&note.created_by)
        .bind(&note.note)
        .bind(note.note_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notes(&self, alarm_id: Uuid) -> Result<Vec<AlarmNote>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, alarm_id, created_at, created_by, note, note_type
             FROM alarm_notes WHERE alarm_id = $1 ORDER BY created_at ASC",
        )
        .bind(alarm_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let note_type: String = r.try_get("note_type")?;
                Ok(AlarmNote {
                    id: r.try_get("id")?,
                    alarm_id: r.try_get("alarm_id")?,
                    created_at: r.try_get("created_at")?,
                    created_by: r.try_get("created_by")?,
                    note: r.try_get("note")?,
                    note_type: NoteType::parse(&note_type).unwrap_or(NoteType::Manual),
                })
            })
            .collect()
    }

    async fn insert_notification(&self, row: &AlarmNotification) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alarm_notifications
               (id, alarm_id, created_at, channel, target_id, payload, result, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(row.id)
        .bind(row.alarm_id)
        .bind(row.created_at)
        .bind(row.channel.as_str())
        .bind(&row.target_id)
        .bind(&row.payload)
        .bind(row.result.as_str())
        .bind(&row.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        alarm_id: Uuid,
    ) -> Result<Vec<AlarmNotification>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, alarm_id, created_at, channel, target_id, payload, result, error
             FROM alarm_notifications WHERE alarm_id = $1 ORDER BY created_at ASC",
        )
        .bind(alarm_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let channel: String = r.try_get("channel")?;
                let result: String = r.try_get("result")?;
                Ok(AlarmNotification {
                    id: r.try_get("id")?,
                    alarm_id: r.try_get("alarm_id")?,
                    created_at: r.try_get("created_at")?,
                    channel: parse_channel(&channel)?,
                    target_id: r.try_get("target_id")?,
                    payload: r.try_get("payload")?,
                    result: DispatchResult::parse(&result).unwrap_or(DispatchResult::Unknown),
                    error: r.try_get("error")?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
