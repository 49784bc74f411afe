// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rein-daemon: The task watcher.
//!
//! A long-lived process that scans the tasks root for pending task
//! descriptors, spawns one worker subprocess per task up to a cap,
//! streams worker stdout for the well-known marker lines, and broadcasts
//! typed events to subscribers. Tasks and watcher communicate only
//! through the filesystem — this is load-bearing for crash recovery.

pub mod bus;
pub mod server;
pub mod snapshot;
pub mod watcher;

pub use bus::{EventBus, WatchEvent};
pub use snapshot::{running_tasks, task_snapshot};
pub use watcher::{Watcher, WatcherConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tasks root does not exist: {0}")]
    MissingTasksRoot(std::path::PathBuf),
}
