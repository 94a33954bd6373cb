// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral key-value port: idempotency reservations and rate counters.
//!
//! Only short-lived keys live here; a cold wipe loses nothing durable.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryKv;
pub use self::redis::RedisKv;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Atomic set-if-absent with TTL. Returns whether the write won.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Increment a counter, returning the new value. Callers set the TTL on
    /// first increment via [`expire`](Self::expire).
    async fn incr(&self, key: &str) -> Result<i64, KvError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Liveness probe for /readyz.
    async fn ping(&self) -> Result<(), KvError>;
}
