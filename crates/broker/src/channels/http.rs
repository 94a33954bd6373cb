// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared retrying HTTP helper for outbound channels.

use std::time::Duration;

use super::ChannelError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

fn classify(err: &reqwest::Error) -> ChannelError {
    if err.is_timeout() {
        ChannelError::Timeout(err.to_string())
    } else {
        ChannelError::Http(err.to_string())
    }
}

/// Send a JSON request, retrying with exponential backoff. The final
/// failure surfaces as a single error; intermediate failures are logged at
/// debug level only.
pub async fn send_json_with_retry(
    request: impl Fn() -> reqwest::RequestBuilder,
    what: &'static str,
) -> Result<reqwest::Response, ChannelError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = ChannelError::Http("no attempt made".to_owned());

    for attempt in 1..=MAX_ATTEMPTS {
        match request().send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => return Ok(resp),
                Err(e) => last_err = classify(&e),
            },
            Err(e) => last_err = classify(&e),
        }
        if attempt < MAX_ATTEMPTS {
            tracing::debug!(what, attempt, err = %last_err, "outbound request failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
    Err(last_err)
}
