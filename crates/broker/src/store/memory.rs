// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store used by the test suite and local demos.
//!
//! Mirrors the Postgres implementation's observable behavior, including the
//! cursor continuation predicate, so listing semantics can be tested without
//! a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    Alarm, AlarmNote, AlarmNotification, AlarmQuery, AlarmStats, Device, EscalationPolicy,
    EscalationStep, EscalationTarget, Person, Room, Site, SortField, SortOrder, Store, StoreError,
};

#[derive(Debug, Default)]
struct Inner {
    sites: HashMap<String, Site>,
    rooms: HashMap<String, Room>,
    persons: HashMap<String, Person>,
    devices: HashMap<String, Device>,
    targets: HashMap<String, EscalationTarget>,
    policies: HashMap<String, EscalationPolicy>,
    steps: Vec<EscalationStep>,
    alarms: HashMap<Uuid, Alarm>,
    notes: Vec<AlarmNote>,
    notifications: Vec<AlarmNotification>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Comparable sort key for one alarm under one sort field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Time(i64),
    Text(String),
}

fn sort_key(alarm: &Alarm, field: SortField) -> SortKey {
    match field {
        SortField::CreatedAt => SortKey::Time(alarm.created_at.timestamp_micros()),
        SortField::Status => SortKey::Text(alarm.status.as_str().to_owned()),
        SortField::Severity => SortKey::Text(alarm.severity.clone()),
    }
}

fn matches(alarm: &Alarm, query: &AlarmQuery) -> bool {
    if !query.include_deleted && alarm.deleted_at.is_some() {
        return false;
    }
    if let Some(status) = query.status {
        if alarm.status != status {
            return false;
        }
    }
    if let Some(ref severity) = query.severity {
        if &alarm.severity != severity {
            return false;
        }
    }
    if let Some(ref person_id) = query.person_id {
        if alarm.person_id.as_ref() != Some(person_id) {
            return false;
        }
    }
    if let Some(ref room_id) = query.room_id {
        if alarm.room_id.as_ref() != Some(room_id) {
            return false;
        }
    }
    if let Some(ref site_id) = query.site_id {
        if alarm.site_id.as_ref() != Some(site_id) {
            return false;
        }
    }
    if let Some(ref device_id) = query.device_id {
        if alarm.device_id.as_ref() != Some(device_id) {
            return false;
        }
    }
    if let Some(ref source) = query.source {
        if &alarm.source != source {
            return false;
        }
    }
    if let Some(after) = query.created_after {
        if alarm.created_at < after {
            return false;
        }
    }
    if let Some(before) = query.created_before {
        if alarm.created_at > before {
            return false;
        }
    }
    true
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_site(&self, site: &Site) -> Result<(), StoreError> {
        self.lock().sites.insert(site.id.clone(), site.clone());
        Ok(())
    }

    async fn get_site(&self, id: &str) -> Result<Option<Site>, StoreError> {
        Ok(self.lock().sites.get(id).cloned())
    }

    async fn upsert_room(&self, room: &Room) -> Result<(), StoreError> {
        self.lock().rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.lock().rooms.get(id).cloned())
    }

    async fn upsert_person(&self, person: &Person) -> Result<(), StoreError> {
        self.lock().persons.insert(person.id.clone(), person.clone());
        Ok(())
    }

    async fn get_person(&self, id: &str) -> Result<Option<Person>, StoreError> {
        Ok(self.lock().persons.get(id).cloned())
    }

    async fn upsert_device(&self, device: &Device) -> Result<Device, StoreError> {
        let mut inner = self.lock();
        let existing_id = inner
            .devices
            .values()
            .find(|d| d.device_token == device.device_token)
            .map(|d| d.id.clone());
        if let Some(old_id) = existing_id {
            // Keyed by device_token: replace the existing row, keeping its
            // last_seen timestamp.
            let last_seen = inner.devices.get(&old_id).and_then(|d| d.last_seen_at);
            inner.devices.remove(&old_id);
            let mut updated = device.clone();
            updated.last_seen_at = last_seen;
            inner.devices.insert(updated.id.clone(), updated.clone());
            Ok(updated)
        } else {
            inner.devices.insert(device.id.clone(), device.clone());
            Ok(device.clone())
        }
    }

    async fn get_device_by_token(&self, token: &str) -> Result<Option<Device>, StoreError> {
        Ok(self.lock().devices.values().find(|d| d.device_token == token).cloned())
    }

    async fn upsert_target(&self, target: &EscalationTarget) -> Result<(), StoreError> {
        self.lock().targets.insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn get_target(&self, id: &str) -> Result<Option<EscalationTarget>, StoreError> {
        Ok(self.lock().targets.get(id).cloned())
    }

    async fn upsert_policy(&self, policy: &EscalationPolicy) -> Result<(), StoreError> {
        self.lock().policies.insert(policy.id.clone(), policy.clone());
        Ok(())
    }

    async fn replace_policy_steps(
        &self,
        policy_id: &str,
        steps: &[EscalationStep],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.steps.retain(|s| s.policy_id != policy_id);
        inner.steps.extend(steps.iter().cloned());
        Ok(())
    }

    async fn steps_with_targets(
        &self,
        policy_id: &str,
        step_no: i32,
    ) -> Result<Vec<(EscalationStep, EscalationTarget)>, StoreError> {
        let inner = self.lock();
        let mut out = Vec::new();
        for step in &inner.steps {
            if step.policy_id == policy_id && step.step_no == step_no {
                if let Some(target) = inner.targets.get(&step.target_id) {
                    out.push((step.clone(), target.clone()));
                }
            }
        }
        out.sort_by(|a, b| a.0.target_id.cmp(&b.0.target_id));
        Ok(out)
    }

    async fn deferred_steps(&self, policy_id: &str) -> Result<Vec<(i32, i64)>, StoreError> {
        let inner = self.lock();
        let mut pairs: Vec<(i32, i64)> = inner
            .steps
            .iter()
            .filter(|s| s.policy_id == policy_id && s.step_no > 0)
            .map(|s| (s.step_no, s.after_seconds))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        Ok(pairs)
    }

    async fn existing_target_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let inner = self.lock();
        Ok(ids.iter().filter(|id| inner.targets.contains_key(*id)).cloned().collect())
    }

    async fn create_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(ref device_id) = alarm.device_id {
            if let Some(device) = inner.devices.get_mut(device_id) {
                device.last_seen_at = Some(alarm.created_at);
            }
        }
        inner.alarms.insert(alarm.id, alarm.clone());
        Ok(())
    }

    async fn get_alarm(&self, id: Uuid) -> Result<Option<Alarm>, StoreError> {
        Ok(self.lock().alarms.get(&id).cloned())
    }

    async fn get_alarms(&self, ids: &[Uuid]) -> Result<Vec<Alarm>, StoreError> {
        let inner = self.lock();
        Ok(ids.iter().filter_map(|id| inner.alarms.get(id).cloned()).collect())
    }

    async fn get_alarm_by_ack_token(&self, token: &str) -> Result<Option<Alarm>, StoreError> {
        Ok(self.lock().alarms.values().find(|a| a.ack_token.as_deref() == Some(token)).cloned())
    }

    async fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        self.lock().alarms.insert(alarm.id, alarm.clone());
        Ok(())
    }

    async fn set_ticket_id(&self, alarm_id: Uuid, ticket_id: i64) -> Result<(), StoreError> {
        if let Some(alarm) = self.lock().alarms.get_mut(&alarm_id) {
            alarm.ticket_id = Some(ticket_id);
        }
        Ok(())
    }

    async fn list_alarms(&self, query: &AlarmQuery) -> Result<Vec<Alarm>, StoreError> {
        let inner = self.lock();

        let cursor_key = match query.cursor {
            Some(cursor_id) => inner
                .alarms
                .get(&cursor_id)
                .map(|cursor| (sort_key(cursor, query.sort_by), cursor.id)),
            None => None,
        };

        let mut rows: Vec<&Alarm> = inner
            .alarms
            .values()
            .filter(|a| matches(a, query))
            .filter(|a| match &cursor_key {
                None => true,
                Some(cursor) => {
                    let key = (sort_key(a, query.sort_by), a.id);
                    match query.sort_order {
                        SortOrder::Desc => key < *cursor,
                        SortOrder::Asc => key > *cursor,
                    }
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            let ka = (sort_key(a, query.sort_by), a.id);
            let kb = (sort_key(b, query.sort_by), b.id);
            match query.sort_order {
                SortOrder::Asc => ka.cmp(&kb),
                SortOrder::Desc => kb.cmp(&ka),
            }
        });

        rows.truncate(query.limit + 1);
        Ok(rows.into_iter().cloned().collect())
    }

    async fn alarm_stats(&self) -> Result<AlarmStats, StoreError> {
        let inner = self.lock();
        let mut stats = AlarmStats::default();
        for alarm in inner.alarms.values().filter(|a| a.deleted_at.is_none()) {
            stats.total += 1;
            *stats.by_status.entry(alarm.status.as_str().to_owned()).or_default() += 1;
            *stats.by_severity.entry(alarm.severity.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    async fn insert_note(&self, note: &AlarmNote) -> Result<(), StoreError> {
        self.lock().notes.push(note.clone());
        Ok(())
    }

    async fn list_notes(&self, alarm_id: Uuid) -> Result<Vec<AlarmNote>, StoreError> {
        let inner = self.lock();
        let mut notes: Vec<AlarmNote> =
            inner.notes.iter().filter(|n| n.alarm_id == alarm_id).cloned().collect();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }

    async fn insert_notification(&self, row: &AlarmNotification) -> Result<(), StoreError> {
        self.lock().notifications.push(row.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        alarm_id: Uuid,
    ) -> Result<Vec<AlarmNotification>, StoreError> {
        let inner = self.lock();
        Ok(inner.notifications.iter().filter(|n| n.alarm_id == alarm_id).cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
