// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn manual_clock_advances() {
    let start = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).single().unwrap_or_default();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(std::time::Duration::from_secs(90));
    assert_eq!(clock.epoch_seconds(), start.timestamp() + 90);
}

#[test]
fn ack_tokens_are_unique_and_url_safe() {
    let a = new_ack_token();
    let b = new_ack_token();
    assert_ne!(a, b);
    // 32 bytes of entropy => 43 base64 chars without padding.
    assert_eq!(a.len(), 43);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn token_digest_hides_the_raw_token() {
    let digest = token_digest("YLK_T54W_3F9A");
    assert_eq!(digest.len(), 64);
    assert!(!digest.contains("YLK"));
    assert_eq!(digest, token_digest("YLK_T54W_3F9A"));
    assert_eq!(token_digest_prefix("YLK_T54W_3F9A").len(), 12);
}
