// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    sonnet = { "claude-sonnet-4", 1_000_000, 0, 3.0 },
    sonnet_output = { "claude-sonnet-4", 0, 1_000_000, 15.0 },
    gpt4o_mini = { "gpt-4o-mini", 2_000_000, 1_000_000, 0.90 },
    unknown = { "mystery-model", 1_000_000, 1_000_000, 0.0 },
)]
fn cost_calculation(model: &str, input: u64, output: u64, expected: f64) {
    let cost = calculate_cost(model, input, output);
    assert!((cost - expected).abs() < 1e-9, "got {cost}, want {expected}");
}

#[test]
fn small_counts_produce_small_costs() {
    let cost = calculate_cost("claude-haiku-4", 1_000, 500);
    assert!(cost > 0.0 && cost < 0.01);
}
