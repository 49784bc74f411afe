// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp and elapsed-time formatting helpers

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 string (`2026-01-30T08:14:09Z`).
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Timestamp id for new tasks: `task-YYYYMMDD-HHMMSS`.
pub fn task_id_now() -> String {
    format!("task-{}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Format elapsed milliseconds as a compact human string.
pub fn format_elapsed_ms(elapsed_ms: u64) -> String {
    let secs = elapsed_ms / 1000;
    if secs < 60 {
        format!("{}.{}s", secs, (elapsed_ms % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
