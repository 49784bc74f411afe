// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn iso_now_is_rfc3339_utc() {
    let now = iso_now();
    assert!(now.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
}

#[test]
fn task_id_has_expected_shape() {
    let id = task_id_now();
    // task-YYYYMMDD-HHMMSS
    assert_eq!(id.len(), "task-20260101-120000".len());
    assert!(id.starts_with("task-"));
}

#[parameterized(
    millis = { 700, "0.7s" },
    seconds = { 12_300, "12.3s" },
    minutes = { 95_000, "1m35s" },
    hours = { 3_720_000, "1h02m" },
)]
fn elapsed_formatting(elapsed_ms: u64, expected: &str) {
    assert_eq!(format_elapsed_ms(elapsed_ms), expected);
}
