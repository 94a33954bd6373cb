// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queue port: enqueue-now, enqueue-after, and at-least-once worker
//! dequeue.
//!
//! Callers hand over typed [`Job`] values; how jobs are named and encoded on
//! the wire stays inside the adapters.

pub mod memory;
pub mod redis;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::AlarmStatus;

pub use self::memory::MemoryQueue;
pub use self::redis::RedisQueue;
pub use self::worker::Worker;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue error: {0}")]
    Backend(String),
    #[error("malformed job payload: {0}")]
    Codec(String),
}

/// Work items the broker emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    AlarmCreated { alarm_id: Uuid },
    Escalate { alarm_id: Uuid, step_no: i32 },
    AlarmAcked { alarm_id: Uuid, acked_by: Option<String>, note: Option<String> },
    StateChanged { alarm_id: Uuid, state: AlarmStatus },
}

/// One leased job. The receipt keeps redelivery honest: a worker that dies
/// before [`Queue::ack`] leaves the job recoverable.
#[derive(Debug, Clone)]
pub struct Lease {
    pub job: Job,
    pub receipt: String,
}

/// Envelope that actually travels on the wire; the id makes each leased
/// payload unique so acknowledgment can remove exactly one copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub id: Uuid,
    #[serde(flatten)]
    pub job: Job,
}

impl Envelope {
    pub(crate) fn wrap(job: Job) -> Self {
        Self { id: Uuid::new_v4(), job }
    }

    pub(crate) fn encode(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Codec(e.to_string()))
    }

    pub(crate) fn decode(raw: &str) -> Result<Self, QueueError> {
        serde_json::from_str(raw).map_err(|e| QueueError::Codec(e.to_string()))
    }
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    async fn enqueue_after(&self, job: Job, delay: Duration) -> Result<(), QueueError>;

    /// Move deferred jobs whose delay has elapsed onto the ready queue.
    /// Returns how many were promoted.
    async fn promote_due(&self) -> Result<usize, QueueError>;

    /// Lease the next ready job, waiting up to `timeout`.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Lease>, QueueError>;

    /// Acknowledge a leased job as done.
    async fn ack(&self, lease: &Lease) -> Result<(), QueueError>;

    /// Re-queue jobs left leased by a previous worker run.
    async fn recover(&self) -> Result<usize, QueueError>;

    /// Liveness probe for /readyz.
    async fn ping(&self) -> Result<(), QueueError>;
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
