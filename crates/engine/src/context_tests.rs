// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn ctx(dir: &TempDir) -> TaskContext {
    TaskContext {
        task_id: "task-1".to_string(),
        task_dir: dir.path().join("task"),
        workflow_dir: dir.path().join("flow"),
        task_input: Map::new(),
    }
}

#[test]
fn path_layout() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir);
    assert!(ctx.result_path("draft").ends_with("task/draft/outputs/result.json"));
    assert!(ctx.state_dir().ends_with("task/state"));
}

#[test]
fn ensure_block_dirs_creates_working_areas() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir);
    ctx.ensure_block_dirs("draft").unwrap();
    for sub in ["inputs", "outputs", "logs"] {
        assert!(ctx.block_dir("draft").join(sub).is_dir(), "{sub} missing");
    }
}

#[test]
fn clean_outputs_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir);
    ctx.ensure_block_dirs("draft").unwrap();
    std::fs::write(ctx.result_path("draft"), "{}").unwrap();

    ctx.clean_outputs("draft").unwrap();
    assert!(!ctx.outputs_dir("draft").exists());
    // second clean is a no-op
    ctx.clean_outputs("draft").unwrap();
}

#[test]
fn socket_path_embeds_task_id() {
    let path = command_socket_path("task-42");
    assert!(path.to_string_lossy().contains("rein-task-42.sock"));
}
