// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use uuid::Uuid;

use super::*;
use crate::clock::ManualClock;

fn queue_with_clock() -> (MemoryQueue, Arc<ManualClock>) {
    let start = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap_or_default();
    let clock = Arc::new(ManualClock::new(start));
    (MemoryQueue::new(clock.clone()), clock)
}

#[test]
fn envelope_round_trips() {
    let envelope = Envelope::wrap(Job::Escalate { alarm_id: Uuid::new_v4(), step_no: 2 });
    let raw = envelope.encode().unwrap_or_default();
    let decoded = Envelope::decode(&raw).unwrap_or(Envelope::wrap(Job::AlarmCreated {
        alarm_id: Uuid::nil(),
    }));
    assert_eq!(decoded.id, envelope.id);
    assert_eq!(decoded.job, envelope.job);
}

#[tokio::test]
async fn ready_jobs_dequeue_in_order() {
    let (queue, _clock) = queue_with_clock();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let _ = queue.enqueue(Job::AlarmCreated { alarm_id: a }).await;
    let _ = queue.enqueue(Job::AlarmCreated { alarm_id: b }).await;

    let first = queue.dequeue(Duration::ZERO).await.unwrap_or(None);
    assert!(matches!(first, Some(Lease { job: Job::AlarmCreated { alarm_id }, .. }) if alarm_id == a));
    let second = queue.dequeue(Duration::ZERO).await.unwrap_or(None);
    assert!(matches!(second, Some(Lease { job: Job::AlarmCreated { alarm_id }, .. }) if alarm_id == b));
    assert!(queue.dequeue(Duration::ZERO).await.unwrap_or(None).is_none());
}

#[tokio::test]
async fn deferred_jobs_wait_for_the_clock() {
    let (queue, clock) = queue_with_clock();
    let id = Uuid::new_v4();
    let _ = queue
        .enqueue_after(Job::Escalate { alarm_id: id, step_no: 1 }, Duration::from_secs(60))
        .await;

    assert_eq!(queue.promote_due().await.unwrap_or(99), 0);
    assert!(queue.dequeue(Duration::ZERO).await.unwrap_or(None).is_none());

    clock.advance(Duration::from_secs(61));
    assert_eq!(queue.promote_due().await.unwrap_or(0), 1);
    let lease = queue.dequeue(Duration::ZERO).await.unwrap_or(None);
    assert!(matches!(lease, Some(Lease { job: Job::Escalate { step_no: 1, .. }, .. })));
}

#[tokio::test]
async fn unacked_jobs_are_recoverable() {
    let (queue, _clock) = queue_with_clock();
    let _ = queue.enqueue(Job::AlarmCreated { alarm_id: Uuid::new_v4() }).await;

    let lease = queue.dequeue(Duration::ZERO).await.unwrap_or(None);
    assert!(lease.is_some());
    // Worker dies here without ack.
    assert_eq!(queue.recover().await.unwrap_or(0), 1);

    // Re-leased and acked jobs stay gone.
    let lease = queue.dequeue(Duration::ZERO).await.unwrap_or(None);
    assert!(lease.is_some());
    if let Some(lease) = lease {
        let _ = queue.ack(&lease).await;
    }
    assert_eq!(queue.recover().await.unwrap_or(99), 0);
    assert!(queue.dequeue(Duration::ZERO).await.unwrap_or(None).is_none());
}
