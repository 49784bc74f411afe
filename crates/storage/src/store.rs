// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable process table: one record per block, keyed by name.
//!
//! The table lives in a single JSON file. Every upsert rewrites it via
//! temp-file + rename + fsync, so the file on disk is always a complete,
//! parseable table — the durability point is the rename, before the
//! transition becomes observable to the rest of the orchestrator.

use rein_core::ProcessRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const TABLE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Table {
    version: u32,
    processes: Vec<ProcessRecord>,
}

/// Single-writer process table for one task.
pub struct TaskStore {
    path: PathBuf,
    records: BTreeMap<String, ProcessRecord>,
}

impl TaskStore {
    /// Open the table. A fresh run (`resume = false`) wipes any previous
    /// table; a resume keeps it and replays existing records.
    pub fn open(path: &Path, resume: bool) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut store = Self {
            path: path.to_owned(),
            records: BTreeMap::new(),
        };

        if resume && path.exists() {
            store.records = Self::read_table(path)?;
        } else if path.exists() {
            std::fs::remove_file(path)?;
        }

        Ok(store)
    }

    /// Read the table without taking writership (watcher / status views).
    /// Missing file means an uninitialized task: empty table.
    pub fn load(path: &Path) -> Result<Vec<ProcessRecord>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let records = Self::read_table(path)?;
        Ok(Self::ordered(&records))
    }

    fn read_table(path: &Path) -> Result<BTreeMap<String, ProcessRecord>, StoreError> {
        let bytes = std::fs::read(path)?;
        let table: Table = match serde_json::from_slice(&bytes) {
            Ok(table) => table,
            Err(e) => {
                // A half-written table should be impossible (rename is
                // atomic), but a corrupt one must not brick the task.
                warn!(path = %path.display(), error = %e, "unreadable process table, starting empty");
                return Ok(BTreeMap::new());
            }
        };
        Ok(table
            .processes
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect())
    }

    /// Insert or replace a record, committing to disk before returning.
    pub fn upsert(&mut self, record: ProcessRecord) -> Result<(), StoreError> {
        self.records.insert(record.name.clone(), record);
        self.persist()
    }

    pub fn get(&self, name: &str) -> Option<&ProcessRecord> {
        self.records.get(name)
    }

    /// All records ordered by `(phase, name)`.
    pub fn all(&self) -> Vec<ProcessRecord> {
        Self::ordered(&self.records)
    }

    /// Wipe the table (fresh runs only).
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        self.persist()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ordered(records: &BTreeMap<String, ProcessRecord>) -> Vec<ProcessRecord> {
        let mut all: Vec<ProcessRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| (a.phase, &a.name).cmp(&(b.phase, &b.name)));
        all
    }

    fn persist(&self) -> Result<(), StoreError> {
        let table = Table {
            version: TABLE_VERSION,
            processes: self.records.values().cloned().collect(),
        };
        let tmp_path = self.path.with_extension("db.tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(&serde_json::to_vec_pretty(&table)?)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
