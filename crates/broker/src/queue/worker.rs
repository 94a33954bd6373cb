// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime: binds job payloads to their handlers and drains the
//! queue until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{Job, Queue};
use crate::escalation;
use crate::metrics::Metrics;
use crate::state::AppState;

pub struct Worker {
    state: Arc<AppState>,
}

impl Worker {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Dispatch one job. Handler failures are logged, not propagated: the
    /// escalation status guard makes re-running safe, and a poisoned payload
    /// must not wedge the queue.
    pub async fn handle(&self, job: Job) {
        let state = &self.state;
        let result = match job {
            Job::AlarmCreated { alarm_id } => escalation::alarm_created(state, alarm_id).await,
            Job::Escalate { alarm_id, step_no } => {
                escalation::escalate(state, alarm_id, step_no).await
            }
            Job::AlarmAcked { alarm_id, acked_by, note } => {
                escalation::alarm_acked(state, alarm_id, acked_by.as_deref(), note.as_deref())
                    .await
            }
            Job::StateChanged { alarm_id, state: status } => {
                escalation::state_changed(state, alarm_id, status).await
            }
        };
        Metrics::incr(&state.metrics.jobs_processed);
        if let Err(e) = result {
            tracing::error!(err = %e, "job handler failed");
        }
    }

    /// Promote due deferred jobs and drain everything ready right now.
    /// Returns the number of jobs processed. Test- and shutdown-facing.
    pub async fn run_pending(&self) -> usize {
        let mut processed = 0usize;
        if let Err(e) = self.state.queue.promote_due().await {
            tracing::warn!(err = %e, "promoting deferred jobs failed");
        }
        loop {
            match self.state.queue.dequeue(Duration::ZERO).await {
                Ok(Some(lease)) => {
                    self.handle(lease.job.clone()).await;
                    if let Err(e) = self.state.queue.ack(&lease).await {
                        tracing::warn!(err = %e, "job ack failed");
                    }
                    processed += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(err = %e, "dequeue failed");
                    break;
                }
            }
        }
        processed
    }

    /// Run until the token cancels, then drain in-flight work.
    pub async fn run(&self, shutdown: CancellationToken) {
        match self.state.queue.recover().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(recovered = n, "requeued jobs left over from a previous run"),
            Err(e) => tracing::warn!(err = %e, "queue recovery failed"),
        }

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if let Err(e) = self.state.queue.promote_due().await {
                tracing::warn!(err = %e, "promoting deferred jobs failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }

            let lease = tokio::select! {
                _ = shutdown.cancelled() => break,
                lease = self.state.queue.dequeue(Duration::from_secs(1)) => lease,
            };
            match lease {
                Ok(Some(lease)) => {
                    self.handle(lease.job.clone()).await;
                    if let Err(e) = self.state.queue.ack(&lease).await {
                        tracing::warn!(err = %e, "job ack failed");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(err = %e, "dequeue failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        // Drain whatever is already ready before exiting.
        let drained = self.run_pending().await;
        if drained > 0 {
            tracing::info!(drained, "drained in-flight jobs on shutdown");
        }
    }
}
