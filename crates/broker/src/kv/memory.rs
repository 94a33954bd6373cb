// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock-driven in-memory KV for tests and local demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Kv, KvError};
use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// Epoch millis after which the entry is gone.
    expires_at_ms: Option<i64>,
}

pub struct MemoryKv {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now_ms: i64,
    ) -> Option<&'a mut Entry> {
        let expired = entries
            .get(key)
            .is_some_and(|e| e.expires_at_ms.is_some_and(|at| at <= now_ms));
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = self.now_ms();
        let mut entries = self.lock();
        Ok(Self::live(&mut entries, key, now).map(|e| e.value.clone()))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = self.now_ms();
        let mut entries = self.lock();
        if Self::live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_owned(),
            Entry { value: value.to_owned(), expires_at_ms: Some(now + ttl.as_millis() as i64) },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let now = self.now_ms();
        let mut entries = self.lock();
        match Self::live(&mut entries, key, now) {
            Some(entry) => {
                let current: i64 = entry.value.parse().unwrap_or(0);
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_owned(),
                    Entry { value: "1".to_owned(), expires_at_ms: None },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let now = self.now_ms();
        let mut entries = self.lock();
        if let Some(entry) = Self::live(&mut entries, key, now) {
            entry.expires_at_ms = Some(now + ttl.as_millis() as i64);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
