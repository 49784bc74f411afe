// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--status`: read-only task state view.

use anyhow::{bail, Result};
use rein_daemon::task_snapshot;
use rein_flow::AgentsDir;

pub fn show(agents: &AgentsDir, task_id: &str) -> Result<()> {
    let tasks_root = agents.tasks_root();
    if !tasks_root.join(task_id).is_dir() {
        bail!("no task '{task_id}' under {}", tasks_root.display());
    }
    let snapshot = task_snapshot(&tasks_root, task_id);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
