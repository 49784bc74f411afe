// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage and cost accounting for provider calls.

use serde::{Deserialize, Serialize};

/// Usage for a single provider call, or an accumulated total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Fold another call's usage into this accumulator. The first
    /// contributing provider/model labels the total.
    pub fn accumulate(&mut self, other: &UsageStats) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
        self.duration_ms += other.duration_ms;
        if self.provider.is_empty() {
            self.provider = other.provider.clone();
            self.model = other.model.clone();
        }
    }

    /// Summary-file representation with the derived total included.
    pub fn to_summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "input_tokens": self.input_tokens,
            "output_tokens": self.output_tokens,
            "total_tokens": self.total_tokens(),
            "cost": (self.cost * 1e6).round() / 1e6,
            "model": self.model,
            "provider": self.provider,
            "duration_ms": self.duration_ms,
        })
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
