// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn block_start_round_trips() {
    let marker = Marker::BlockStart {
        task: "task-20260101-120000".to_string(),
        block: "draft".to_string(),
    };
    let line = marker.to_string();
    assert_eq!(line, "[BLOCK_START] task=task-20260101-120000 block=draft");
    assert_eq!(Marker::parse(&line), Some(marker));
}

#[test]
fn task_done_round_trips() {
    let marker = Marker::TaskDone {
        task: "task-1".to_string(),
        status: "completed".to_string(),
        blocks: 3,
    };
    assert_eq!(Marker::parse(&marker.to_string()), Some(marker));
}

#[test]
fn parse_tolerates_leading_prefix() {
    let parsed = Marker::parse("2026-01-01T00:00:00 | [BLOCK_DONE] task=t block=b");
    assert_eq!(
        parsed,
        Some(Marker::BlockDone {
            task: "t".to_string(),
            block: "b".to_string(),
        })
    );
}

#[parameterized(
    plain_text = { "hello world" },
    unknown_tag = { "[BLOCK_RETRY] task=t block=b" },
    missing_block = { "[BLOCK_START] task=t" },
    missing_count = { "[TASK_DONE] task=t status=completed" },
    bad_count = { "[TASK_DONE] task=t status=completed blocks=lots" },
)]
fn parse_rejects(line: &str) {
    assert_eq!(Marker::parse(line), None);
}

#[test]
fn task_id_accessor() {
    let marker = Marker::parse("[BLOCK_START] task=t1 block=b").unwrap();
    assert_eq!(marker.task_id(), "t1");
}
