// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical per-block result file (`outputs/result.json`).

use crate::usage::UsageStats;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("result file is empty: {0}")]
    Empty(String),
}

/// Envelope written by a block on success.
///
/// `result` is either the raw provider text (string) or a structured
/// object left behind by a logic script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub stage: String,
    pub result: serde_json::Value,
    /// ISO-8601 completion timestamp.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
}

impl ResultEnvelope {
    pub fn new(stage: impl Into<String>, result: serde_json::Value, timestamp: String) -> Self {
        Self {
            stage: stage.into(),
            result,
            timestamp,
            usage: None,
        }
    }

    /// Write the envelope via temp-file + rename so a crash mid-write
    /// leaves either the previous file or nothing — never a truncated one.
    pub fn write(&self, path: &Path) -> Result<(), EnvelopeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(&serde_json::to_vec_pretty(self)?)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Read and parse an envelope; an empty file is an error so the
    /// "done ⇒ result.json non-empty" invariant can be enforced.
    pub fn read(path: &Path) -> Result<Self, EnvelopeError> {
        let bytes = std::fs::read(path)?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(EnvelopeError::Empty(path.display().to_string()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The inner `result` parsed for condition evaluation: objects pass
    /// through, JSON-encoded strings are unwrapped, plain strings become
    /// `{"raw": <string>}`, anything else `{"value": <value>}`.
    pub fn parsed_result(&self) -> serde_json::Value {
        match &self.result {
            serde_json::Value::Object(_) => self.result.clone(),
            serde_json::Value::String(text) => match serde_json::from_str(text) {
                Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
                _ => serde_json::json!({ "raw": text }),
            },
            other => serde_json::json!({ "value": other }),
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
