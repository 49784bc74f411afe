// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rein-storage: Durable per-task state.
//!
//! One task owns a `state/` directory holding the process table
//! (`rein.db`), the append-only event log (`rein.log`), the coarse status
//! marker, and the worker exit code. The worker process is the sole writer
//! of the table; concurrent readers (watcher, status views) tolerate data
//! that is stale by at most one upsert.

pub mod event_log;
pub mod status;
pub mod store;

pub use event_log::EventLog;
pub use status::{clear_status, read_status, write_exit_code, write_status, TaskStatus};
pub use store::{StoreError, TaskStore};

use std::path::{Path, PathBuf};

/// Path of the process table within a task directory.
pub fn db_path(task_dir: &Path) -> PathBuf {
    task_dir.join("state").join("rein.db")
}

/// Path of the event log within a task directory.
pub fn log_path(task_dir: &Path) -> PathBuf {
    task_dir.join("state").join("rein.log")
}
