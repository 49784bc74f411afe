// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run finalization artifacts: `metadata.json`, `summary.json`, readable
//! outputs.

use rein_core::{ResultEnvelope, UsageStats};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Run-level metadata written at finalization.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_dir: String,
    pub db_path: String,
    pub max_parallel: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub total_blocks: u32,
}

/// Counts and usage for `summary.json`.
pub struct SummaryData<'a> {
    pub run_id: &'a str,
    pub start_time: Option<&'a str>,
    pub end_time: &'a str,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub cancelled: u32,
    pub stop_reason: Option<&'a str>,
    pub total_usage: &'a UsageStats,
    pub block_usage: &'a HashMap<String, UsageStats>,
}

pub fn write_metadata(task_dir: &Path, metadata: &RunMetadata) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(metadata).unwrap_or_default();
    std::fs::write(task_dir.join("metadata.json"), json)
}

pub fn write_summary(task_dir: &Path, data: &SummaryData<'_>) -> std::io::Result<()> {
    let mut summary = serde_json::json!({
        "run_id": data.run_id,
        "start_time": data.start_time,
        "end_time": data.end_time,
        "total_blocks": data.total,
        "completed": data.completed,
        "failed": data.failed,
        "skipped": data.skipped,
        "cancelled": data.cancelled,
    });
    if let Some(reason) = data.stop_reason {
        summary["stop_reason"] = serde_json::json!(reason);
    }
    if data.total_usage.total_tokens() > 0 {
        summary["usage"] = data.total_usage.to_summary_json();
        summary["block_usage"] = serde_json::Value::Object(
            data.block_usage
                .iter()
                .map(|(name, usage)| (name.clone(), usage.to_summary_json()))
                .collect(),
        );
    }
    std::fs::write(
        task_dir.join("summary.json"),
        serde_json::to_vec_pretty(&summary).unwrap_or_default(),
    )
}

/// Write `result.md` beside a block's `result.json`: raw text for string
/// results, fenced JSON otherwise. Best-effort.
pub fn write_readable_output(task_dir: &Path, block: &str) {
    let json_path = task_dir.join(block).join("outputs").join("result.json");
    let envelope = match ResultEnvelope::read(&json_path) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(block, error = %e, "readable output skipped");
            return;
        }
    };

    let body = match &envelope.result {
        serde_json::Value::String(text) => text.clone(),
        other => format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(other).unwrap_or_default()
        ),
    };
    let md = format!("# {}\n\n{}\n", envelope.stage, body);
    if let Err(e) = std::fs::write(json_path.with_file_name("result.md"), md) {
        warn!(block, error = %e, "readable output write failed");
    }
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
