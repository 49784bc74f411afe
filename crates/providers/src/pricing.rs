// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static model pricing table (USD per 1M tokens).

struct Pricing {
    model: &'static str,
    input: f64,
    output: f64,
}

const MODEL_PRICING: &[Pricing] = &[
    // Anthropic
    Pricing { model: "claude-sonnet-4", input: 3.0, output: 15.0 },
    Pricing { model: "claude-sonnet-4-20250514", input: 3.0, output: 15.0 },
    Pricing { model: "claude-haiku-4", input: 0.80, output: 4.0 },
    Pricing { model: "claude-haiku-4-5-20251001", input: 0.80, output: 4.0 },
    Pricing { model: "claude-opus-4", input: 15.0, output: 75.0 },
    Pricing { model: "claude-opus-4-20250514", input: 15.0, output: 75.0 },
    // OpenAI
    Pricing { model: "gpt-4o", input: 2.50, output: 10.0 },
    Pricing { model: "gpt-4o-mini", input: 0.15, output: 0.60 },
    Pricing { model: "o1", input: 15.0, output: 60.0 },
    Pricing { model: "o3-mini", input: 1.10, output: 4.40 },
    // OpenRouter-prefixed models
    Pricing { model: "anthropic/claude-sonnet-4", input: 3.0, output: 15.0 },
    Pricing { model: "anthropic/claude-haiku-4", input: 0.80, output: 4.0 },
    Pricing { model: "anthropic/claude-opus-4", input: 15.0, output: 75.0 },
    Pricing { model: "openai/gpt-4o", input: 2.50, output: 10.0 },
    Pricing { model: "openai/gpt-4o-mini", input: 0.15, output: 0.60 },
    Pricing { model: "google/gemini-2.5-pro", input: 1.25, output: 10.0 },
    Pricing { model: "google/gemini-2.5-flash", input: 0.15, output: 0.60 },
    Pricing { model: "deepseek/deepseek-chat-v3", input: 0.27, output: 1.10 },
];

/// Cost in USD for the given token counts. Unknown models cost 0 —
/// usage is still tracked, only the dollar figure is missing.
pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let Some(pricing) = MODEL_PRICING.iter().find(|p| p.model == model) else {
        return 0.0;
    };
    (input_tokens as f64 / 1_000_000.0) * pricing.input
        + (output_tokens as f64 / 1_000_000.0) * pricing.output
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
