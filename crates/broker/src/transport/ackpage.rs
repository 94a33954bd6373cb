// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acknowledgment page rendering.
//!
//! Every alarm-derived value is escaped before it reaches the markup; the
//! ack token itself is never rendered (the form posts back to its own URL).

use crate::notify::Enriched;
use crate::store::{Alarm, AlarmStatus};

/// Minimal HTML escaping for text and attribute positions.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_description(status: AlarmStatus) -> &'static str {
    match status {
        AlarmStatus::Triggered => "The alarm is new and waiting for a responder.",
        AlarmStatus::Acknowledged => "The alarm has been taken over and is being handled.",
        AlarmStatus::Resolved => "The alarm has been closed.",
        AlarmStatus::Cancelled => "The alarm was cancelled.",
    }
}

fn info_message(status: AlarmStatus) -> &'static str {
    match status {
        AlarmStatus::Triggered => "Please acknowledge the alarm to confirm you are responding.",
        AlarmStatus::Acknowledged => "This alarm has already been acknowledged.",
        AlarmStatus::Resolved => "This alarm is already resolved.",
        AlarmStatus::Cancelled => "This alarm was cancelled.",
    }
}

pub fn render(alarm: &Alarm, enriched: &Enriched) -> String {
    let person = escape_html(&enriched.person_name);
    let room = escape_html(&enriched.room_label);
    let created = escape_html(&alarm.created_at.to_rfc3339());
    let status_label = escape_html(alarm.status.as_str());
    let is_triggered = alarm.status == AlarmStatus::Triggered;
    let headline = if is_triggered { "Acknowledge alarm" } else { "Alarm" };
    let badge_color = if is_triggered { "#b45309" } else { "#047857" };

    let form_block = if is_triggered {
        r#"    <form method="post" onsubmit="return lockSubmit(this)">
      <label for="acked_by">Your name (optional)
        <input id="acked_by" name="acked_by" maxlength="120" autocomplete="name">
      </label>
      <label for="note">Note (optional)
        <textarea id="note" name="note" maxlength="2000" rows="4"></textarea>
      </label>
      <button type="submit">Take over alarm</button>
      <p class="hint">The page refreshes automatically after submitting.</p>
    </form>
"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{headline}</title>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 32rem; padding: 0 1rem; color: #111827; }}
    .badge {{ display: inline-block; padding: 0.2rem 0.6rem; border-radius: 0.4rem; color: #fff; background: {badge_color}; }}
    dl {{ display: grid; grid-template-columns: auto 1fr; gap: 0.3rem 1rem; }}
    dt {{ font-weight: 600; }}
    label {{ display: block; margin: 0.8rem 0; }}
    input, textarea {{ width: 100%; padding: 0.4rem; border: 1px solid #d1d5db; border-radius: 0.3rem; }}
    button {{ padding: 0.5rem 1.2rem; border: 0; border-radius: 0.3rem; background: #b45309; color: #fff; font-size: 1rem; }}
    .hint {{ color: #6b7280; font-size: 0.85rem; }}
    .info {{ margin: 1rem 0; padding: 0.6rem 0.8rem; border-left: 4px solid {badge_color}; background: #f9fafb; }}
  </style>
  <script>
    function lockSubmit(form) {{
      var button = form.querySelector("button");
      if (button.disabled) {{ return false; }}
      button.disabled = true;
      return true;
    }}
  </script>
</head>
<body>
  <h1>{headline}</h1>
  <p><span class="badge">{status_label}</span> {status_description}</p>
  <dl>
    <dt>Person</dt><dd>{person}</dd>
    <dt>Location</dt><dd>{room}</dd>
    <dt>Raised at</dt><dd>{created}</dd>
  </dl>
  <p class="info">{info_message}</p>
{form_block}</body>
</html>
"#,
        status_description = escape_html(status_description(alarm.status)),
        info_message = escape_html(info_message(alarm.status)),
    )
}

#[cfg(test)]
#[path = "ackpage_tests.rs"]
mod tests;
