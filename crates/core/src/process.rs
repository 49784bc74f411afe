// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-block process record and its status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one block within a task.
///
/// `waiting → running → (done | failed | cancelled)`; `running ⇄ paused`
/// is allowed mid-execution. `skipped` is assigned when a block is elided
/// by failure policy — scheduling treats it like `done`, but no output
/// file exists for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Waiting,
    Running,
    Done,
    Failed,
    Paused,
    Cancelled,
    Skipped,
}

impl BlockStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BlockStatus::Done | BlockStatus::Failed | BlockStatus::Cancelled | BlockStatus::Skipped
        )
    }

    /// Whether this status counts as "completed" for dependency scheduling.
    ///
    /// Failed blocks count too: downstream blocks decide via their own
    /// `skip_if_previous_failed` flag, not by deadlocking on the ready set.
    pub fn unblocks_dependents(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockStatus::Waiting => write!(f, "waiting"),
            BlockStatus::Running => write!(f, "running"),
            BlockStatus::Done => write!(f, "done"),
            BlockStatus::Failed => write!(f, "failed"),
            BlockStatus::Paused => write!(f, "paused"),
            BlockStatus::Cancelled => write!(f, "cancelled"),
            BlockStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Durable record of one block within one task.
///
/// Unique by `name` within a task. Persisted on every transition; after a
/// crash the set of records is sufficient to decide what restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: String,
    /// Short opaque id for this instantiation (new uid per fresh init).
    pub uid: String,
    /// OS pid of the worker process executing the block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub status: BlockStatus,
    /// DAG depth: `max(phase of deps) + 1`, leaves are phase 1.
    pub phase: u32,
    /// Progress percentage, 0..=100, monotonic within one run.
    pub progress: u8,
    pub start_time_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// When paused, dependents may not start until resumed.
    pub blocking_pause: bool,
    /// Specialist identifier configured for the block (display only).
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// How many times this block has been (re-)entered via `next`.
    #[serde(default)]
    pub run_count: u32,
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
}

fn default_max_runs() -> u32 {
    1
}

impl ProcessRecord {
    /// Create a fresh `waiting` record.
    pub fn waiting(name: impl Into<String>, phase: u32, now_ms: u64) -> Self {
        Self {
            name: name.into(),
            uid: crate::uid::short_uid(),
            pid: None,
            status: BlockStatus::Waiting,
            phase,
            progress: 0,
            start_time_ms: now_ms,
            updated_at_ms: now_ms,
            exit_code: None,
            blocking_pause: true,
            agent: String::new(),
            depends_on: Vec::new(),
            run_count: 0,
            max_runs: 1,
        }
    }

    /// Reset the record back to `waiting` for a re-entry via `next` or
    /// resume invalidation.
    pub fn reset_to_waiting(&mut self, now_ms: u64) {
        self.status = BlockStatus::Waiting;
        self.progress = 0;
        self.pid = None;
        self.exit_code = None;
        self.updated_at_ms = now_ms;
    }

    /// Advance progress, enforcing monotonicity.
    pub fn advance_progress(&mut self, progress: u8, now_ms: u64) {
        if progress > self.progress {
            self.progress = progress.min(100);
        }
        self.updated_at_ms = now_ms;
    }

    pub fn matches(&self, identifier: &str) -> bool {
        self.name == identifier || self.uid == identifier
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
