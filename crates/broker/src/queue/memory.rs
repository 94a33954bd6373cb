// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process queue for tests and local demos.
//!
//! Deferred jobs become due against the injected clock, so tests fast-forward
//! escalations by advancing a [`ManualClock`](crate::clock::ManualClock) and
//! calling [`Queue::promote_due`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Envelope, Job, Lease, Queue, QueueError};
use crate::clock::Clock;

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<Envelope>,
    /// (due_at_ms, envelope)
    deferred: Vec<(i64, Envelope)>,
    leased: HashMap<Uuid, Envelope>,
}

pub struct MemoryQueue {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: Mutex::new(Inner::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Jobs currently waiting, ready and deferred. Test-facing.
    pub fn depth(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.ready.len(), inner.deferred.len())
    }

    /// Snapshot of every ready job without leasing. Test-facing.
    pub fn peek_ready(&self) -> Vec<Job> {
        self.lock().ready.iter().map(|e| e.job.clone()).collect()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.lock().ready.push_back(Envelope::wrap(job));
        Ok(())
    }

    async fn enqueue_after(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        let due = self.clock.now().timestamp_millis() + delay.as_millis() as i64;
        self.lock().deferred.push((due, Envelope::wrap(job)));
        Ok(())
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        let now = self.clock.now().timestamp_millis();
        let mut inner = self.lock();
        let mut due: Vec<(i64, Envelope)> = Vec::new();
        inner.deferred.retain(|(at, envelope)| {
            if *at <= now {
                due.push((*at, envelope.clone()));
                false
            } else {
                true
            }
        });
        // Earlier due times drain first.
        due.sort_by_key(|(at, _)| *at);
        let promoted = due.len();
        for (_, envelope) in due {
            inner.ready.push_back(envelope);
        }
        Ok(promoted)
    }

    async fn dequeue(&self, _timeout: Duration) -> Result<Option<Lease>, QueueError> {
        let mut inner = self.lock();
        match inner.ready.pop_front() {
            Some(envelope) => {
                let receipt = envelope.id.to_string();
                inner.leased.insert(envelope.id, envelope.clone());
                Ok(Some(Lease { job: envelope.job, receipt }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        if let Ok(id) = lease.receipt.parse::<Uuid>() {
            self.lock().leased.remove(&id);
        }
        Ok(())
    }

    async fn recover(&self) -> Result<usize, QueueError> {
        let mut inner = self.lock();
        let stranded: Vec<Envelope> = inner.leased.drain().map(|(_, e)| e).collect();
        let recovered = stranded.len();
        for envelope in stranded {
            inner.ready.push_back(envelope);
        }
        Ok(recovered)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
