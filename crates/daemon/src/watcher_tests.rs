// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::WatchEvent;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: WatcherConfig,
}

/// Agents dir with one flow `f` and a stub worker script that prints the
/// marker lines and writes the final status file, like a real worker.
fn fixture(max_workflows: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let agents_dir = dir.path().join("agents");
    let tasks_root = agents_dir.join("tasks");
    std::fs::create_dir_all(agents_dir.join("flows").join("f")).unwrap();
    std::fs::write(
        agents_dir.join("flows").join("f").join("f.yaml"),
        "name: f\nteam: t\nblocks:\n  - name: a\n",
    )
    .unwrap();
    std::fs::create_dir_all(&tasks_root).unwrap();

    let worker = dir.path().join("worker.sh");
    std::fs::write(
        &worker,
        r#"#!/bin/bash
# args: --task <id> --agents-dir <dir>
task="$2"
agents="$4"
dir="$agents/tasks/$task"
mkdir -p "$dir/state"
echo "[BLOCK_START] task=$task block=a"
echo "[BLOCK_DONE] task=$task block=a"
echo "completed" > "$dir/state/status"
echo "[TASK_DONE] task=$task status=completed blocks=1"
exit 0
"#,
    )
    .unwrap();
    std::fs::set_permissions(&worker, std::fs::Permissions::from_mode(0o755)).unwrap();

    Fixture {
        config: WatcherConfig {
            agents_dir,
            tasks_root,
            worker_program: worker,
            interval: Duration::from_millis(50),
            max_workflows,
        },
        _dir: dir,
    }
}

fn stage_task(f: &Fixture, task_id: &str, flow: &str) {
    let task_dir = f.config.tasks_root.join(task_id);
    std::fs::create_dir_all(task_dir.join("state")).unwrap();
    std::fs::write(
        task_dir.join("task.yaml"),
        format!("id: {task_id}\nflow: {flow}\ncreated_at: '2026-01-01T00:00:00Z'\n"),
    )
    .unwrap();
    std::fs::write(task_dir.join("state").join("status"), "pending\n").unwrap();
}

async fn wait_for_workers(watcher: &mut Watcher) {
    for _ in 0..100 {
        watcher.scan_once().unwrap();
        if watcher.active_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("workers did not finish");
}

#[tokio::test]
async fn pending_task_is_picked_up_and_completed() {
    let f = fixture(1);
    stage_task(&f, "task-1", "f");

    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    let mut events = watcher.bus().subscribe();
    watcher.scan_once().unwrap();

    // pending marker deleted before spawn
    let task_dir = f.config.tasks_root.join("task-1");
    assert_ne!(
        rein_storage::read_status(&task_dir),
        Some(TaskStatus::Pending)
    );
    assert_eq!(watcher.active_count(), 1);

    wait_for_workers(&mut watcher).await;

    // worker wrote the final status; markers were broadcast and logged
    assert_eq!(
        rein_storage::read_status(&task_dir),
        Some(TaskStatus::Completed)
    );
    let kinds: Vec<WatchEvent> = [
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
    ]
    .into();
    assert!(matches!(kinds[0], WatchEvent::BlockStart { .. }));
    assert!(matches!(kinds[1], WatchEvent::BlockDone { .. }));
    assert!(matches!(
        kinds[2],
        WatchEvent::TaskDone { blocks: 1, .. }
    ));

    let log = std::fs::read_to_string(task_dir.join("state").join("rein.log")).unwrap();
    assert!(log.contains("[BLOCK_START] task=task-1 block=a"));
    assert!(log.contains("[TASK_DONE] task=task-1 status=completed blocks=1"));
}

#[tokio::test]
async fn cap_limits_concurrent_workers() {
    let f = fixture(1);
    stage_task(&f, "task-1", "f");
    stage_task(&f, "task-2", "f");

    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    watcher.scan_once().unwrap();
    assert_eq!(watcher.active_count(), 1);

    // second task is still pending until a slot frees
    let waiting = [
        rein_storage::read_status(&f.config.tasks_root.join("task-1")),
        rein_storage::read_status(&f.config.tasks_root.join("task-2")),
    ]
    .iter()
    .filter(|s| **s == Some(TaskStatus::Pending))
    .count();
    assert_eq!(waiting, 1);

    wait_for_workers(&mut watcher).await;
    for task in ["task-1", "task-2"] {
        assert_eq!(
            rein_storage::read_status(&f.config.tasks_root.join(task)),
            Some(TaskStatus::Completed),
            "{task} not completed"
        );
    }
}

#[tokio::test]
async fn task_with_unknown_flow_is_skipped() {
    let f = fixture(2);
    stage_task(&f, "task-1", "ghost-flow");

    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    watcher.scan_once().unwrap();

    assert_eq!(watcher.active_count(), 0);
    // marker still pending so an operator can fix the flow and retry
    assert_eq!(
        rein_storage::read_status(&f.config.tasks_root.join("task-1")),
        Some(TaskStatus::Pending)
    );
}

#[tokio::test]
async fn completed_task_is_not_picked_up_again() {
    let f = fixture(2);
    stage_task(&f, "task-1", "f");
    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    watcher.scan_once().unwrap();
    wait_for_workers(&mut watcher).await;

    watcher.scan_once().unwrap();
    assert_eq!(watcher.active_count(), 0);
}

#[tokio::test]
async fn fresh_descriptor_without_marker_counts_as_pending() {
    let f = fixture(2);
    let task_dir = f.config.tasks_root.join("task-1");
    std::fs::create_dir_all(&task_dir).unwrap();
    std::fs::write(task_dir.join("task.yaml"), "id: task-1\nflow: f\ncreated_at: 'x'\n").unwrap();

    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    watcher.scan_once().unwrap();
    assert_eq!(watcher.active_count(), 1);
    wait_for_workers(&mut watcher).await;
}

#[test]
fn missing_tasks_root_is_an_error() {
    let f = fixture(1);
    std::fs::remove_dir_all(&f.config.tasks_root).unwrap();
    let mut watcher = Watcher::new(f.config.clone(), EventBus::new());
    assert!(matches!(
        watcher.scan_once(),
        Err(DaemonError::MissingTasksRoot(_))
    ));
}
