// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume reconciliation: failure cascade over persisted records.
//!
//! Any record left `failed` or `running` was interrupted; it and its
//! transitive dependents restart from `waiting` with outputs removed.
//! `done` and `skipped` records outside that closure are preserved.
//! `cancelled` records never restart — cancellation is explicit user
//! intent and survives resume.

use rein_core::{BlockStatus, ProcessRecord};
use rein_flow::{transitive_dependents, FlowDocument};
use std::collections::{HashMap, HashSet};

pub struct ReconcileResult {
    /// One record per block, ready to run with.
    pub records: HashMap<String, ProcessRecord>,
    /// Names counting as completed for dependency scheduling.
    pub completed: HashSet<String>,
    /// Names whose outputs must be deleted and records re-persisted.
    pub invalidated: HashSet<String>,
    /// How many terminal records were preserved from the previous run.
    pub preserved: u32,
}

pub fn reconcile(
    flow: &FlowDocument,
    phases: &HashMap<String, u32>,
    existing: &[ProcessRecord],
    now_ms: u64,
) -> ReconcileResult {
    let previous: HashMap<&str, &ProcessRecord> =
        existing.iter().map(|r| (r.name.as_str(), r)).collect();

    let seeds: HashSet<String> = existing
        .iter()
        .filter(|r| matches!(r.status, BlockStatus::Failed | BlockStatus::Running))
        .map(|r| r.name.clone())
        .collect();
    let closure = transitive_dependents(&seeds, &flow.blocks);

    let mut result = ReconcileResult {
        records: HashMap::new(),
        completed: HashSet::new(),
        invalidated: HashSet::new(),
        preserved: 0,
    };

    for block in &flow.blocks {
        let phase = phases.get(&block.name).copied().unwrap_or(1);

        let record = match previous.get(block.name.as_str()) {
            Some(prev) if prev.status == BlockStatus::Cancelled => {
                // Never restarts, even downstream of a failure.
                result.completed.insert(block.name.clone());
                result.preserved += 1;
                (*prev).clone()
            }
            Some(prev)
                if matches!(prev.status, BlockStatus::Done | BlockStatus::Skipped)
                    && !closure.contains(&block.name) =>
            {
                result.completed.insert(block.name.clone());
                result.preserved += 1;
                (*prev).clone()
            }
            Some(prev) => {
                // Interrupted, invalidated, or still waiting: restart.
                let mut fresh = fresh_record(block, phase, now_ms);
                fresh.run_count = prev.run_count;
                result.invalidated.insert(block.name.clone());
                fresh
            }
            None => fresh_record(block, phase, now_ms),
        };

        result.records.insert(block.name.clone(), record);
    }

    result
}

fn fresh_record(block: &rein_flow::BlockDef, phase: u32, now_ms: u64) -> ProcessRecord {
    let mut record = ProcessRecord::waiting(&block.name, phase, now_ms);
    record.blocking_pause = block.blocking_pause;
    record.agent = block.specialist.clone().unwrap_or_default();
    record.depends_on = block.depends_on.clone();
    record.max_runs = block.max_runs;
    record
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
