// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The provider capability: `call(prompt, stage) → (text, usage) | error`.

use async_trait::async_trait;
use rein_core::UsageStats;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },
    #[error("no provider configured and none detected from environment")]
    NoneDetected,
    #[error("missing credential for provider '{provider}': {variable} not set")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },
}

/// Text + usage returned by one provider call.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub text: String,
    pub usage: UsageStats,
}

/// Abstract LLM endpoint.
///
/// `stage` is the block name, passed for logging only. Implementations
/// must be safe to share across concurrent block workers.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    async fn call(&self, prompt: &str, stage: &str) -> Result<ProviderReply, ProviderError>;

    /// Human-readable provider name for logging and usage labels.
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Placeholder for runs without any configured provider. Flows built
/// purely from logic scripts never call it; a provider-backed block
/// calling it fails with a clear error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl Provider for UnconfiguredProvider {
    async fn call(&self, _prompt: &str, _stage: &str) -> Result<ProviderReply, ProviderError> {
        Err(ProviderError::NoneDetected)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }

    fn model(&self) -> &str {
        ""
    }
}
