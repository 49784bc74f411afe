// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rein-providers: LLM provider capability and adapters.
//!
//! The orchestrator depends only on the [`Provider`] trait: prompt in,
//! text + usage out. Which backend serves the call is decided once at
//! startup via [`create_provider`].

pub mod anthropic;
pub mod chat;
pub mod pricing;
pub mod provider;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use anthropic::AnthropicProvider;
pub use chat::ChatCompletionsProvider;
pub use pricing::calculate_cost;
pub use provider::{Provider, ProviderError, ProviderReply, UnconfiguredProvider};
pub use registry::{create_provider, ProviderConfig};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProvider;
