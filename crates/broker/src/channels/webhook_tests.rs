// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn signature_is_stable_and_secret_bound() {
    let body = r#"{"event":"alarm.state_changed"}"#;
    let sig = sign("s3cret", body);
    assert!(sig.starts_with("sha256="));
    assert_eq!(sig, sign("s3cret", body));
    assert_ne!(sig, sign("other", body));
    assert_ne!(sig, sign("s3cret", "{}"));
}
