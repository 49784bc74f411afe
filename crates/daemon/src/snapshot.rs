// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only task state views for subscribers and status commands.
//!
//! These read the per-task process table without taking writership and
//! tolerate data that is stale by one upsert.

use rein_core::BlockStatus;
use rein_storage::TaskStore;
use serde_json::{json, Value};
use std::path::Path;

/// Snapshot of one task: derived status, counts, and per-block detail.
pub fn task_snapshot(tasks_root: &Path, task_id: &str) -> Value {
    let task_dir = tasks_root.join(task_id);
    let records = TaskStore::load(&rein_storage::db_path(&task_dir)).unwrap_or_default();

    let count = |s: BlockStatus| records.iter().filter(|r| r.status == s).count();
    let total = records.len();
    let done = count(BlockStatus::Done) + count(BlockStatus::Skipped);
    let failed = count(BlockStatus::Failed);
    let running = count(BlockStatus::Running);

    let status = if total == 0 {
        "pending"
    } else if failed > 0 {
        "failed"
    } else if done == total {
        "completed"
    } else if running > 0 || done > 0 {
        "running"
    } else {
        "pending"
    };

    let blocks: Vec<Value> = records
        .iter()
        .map(|r| {
            let mut block = json!({
                "name": r.name,
                "status": r.status,
                "phase": r.phase,
                "progress": r.progress,
                "started": r.start_time_ms,
                "updated": r.updated_at_ms,
            });
            let output = task_dir.join(&r.name).join("outputs").join("result.json");
            if let Ok(meta) = std::fs::metadata(&output) {
                block["output_size"] = json!(meta.len());
            }
            block
        })
        .collect();

    json!({
        "type": "state",
        "task_id": task_id,
        "status": status,
        "total": total,
        "done": done,
        "failed": failed,
        "running": running,
        "blocks": blocks,
    })
}

/// Task ids with work in flight: a non-empty table, not all done, and no
/// failures yet.
pub fn running_tasks(tasks_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(tasks_root) else {
        return Vec::new();
    };

    let mut running: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|task_id| {
            let db = rein_storage::db_path(&tasks_root.join(task_id));
            let Ok(records) = TaskStore::load(&db) else {
                return false;
            };
            let total = records.len();
            let done = records
                .iter()
                .filter(|r| matches!(r.status, BlockStatus::Done | BlockStatus::Skipped))
                .count();
            let failed = records
                .iter()
                .filter(|r| r.status == BlockStatus::Failed)
                .count();
            total > 0 && done < total && failed == 0
        })
        .collect();
    running.sort();
    running
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
