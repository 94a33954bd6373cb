// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed queue: a ready list, a deferred sorted set, and a processing
//! list per logical worker group for at-least-once delivery.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{Envelope, Job, Lease, Queue, QueueError};

const READY_KEY: &str = "alarmbroker:jobs";
const DEFERRED_KEY: &str = "alarmbroker:jobs:deferred";
const PROCESSING_KEY: &str = "alarmbroker:jobs:processing";

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| QueueError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn map_err(err: redis::RedisError) -> QueueError {
    QueueError::Backend(err.to_string())
}

fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[async_trait]
impl Queue for RedisQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = Envelope::wrap(job).encode()?;
        let _: i64 = conn.lpush(READY_KEY, payload).await.map_err(map_err)?;
        Ok(())
    }

    async fn enqueue_after(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = Envelope::wrap(job).encode()?;
        let due = epoch_ms() + delay.as_millis() as i64;
        let _: i64 = conn.zadd(DEFERRED_KEY, payload, due).await.map_err(map_err)?;
        Ok(())
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let now = epoch_ms();
        let due: Vec<String> = conn
            .zrangebyscore_limit(DEFERRED_KEY, i64::MIN, now, 0, 100)
            .await
            .map_err(map_err)?;

        let mut promoted = 0usize;
        for payload in due {
            // ZREM decides the winner when several workers promote at once.
            let removed: i64 = conn.zrem(DEFERRED_KEY, &payload).await.map_err(map_err)?;
            if removed == 1 {
                let _: i64 = conn.lpush(READY_KEY, &payload).await.map_err(map_err)?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Lease>, QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(READY_KEY)
            .arg(PROCESSING_KEY)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        match payload {
            Some(raw) => {
                let envelope = Envelope::decode(&raw)?;
                Ok(Some(Lease { job: envelope.job, receipt: raw }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(PROCESSING_KEY, 1, &lease.receipt).await.map_err(map_err)?;
        Ok(())
    }

    async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0usize;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(PROCESSING_KEY)
                .arg(READY_KEY)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
                .map_err(map_err)?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(map_err)?;
        Ok(())
    }
}
