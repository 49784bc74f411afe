// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provider for tests: scripted replies, recorded prompts.

use crate::provider::{Provider, ProviderError, ProviderReply};
use async_trait::async_trait;
use parking_lot::Mutex;
use rein_core::UsageStats;
use std::collections::HashMap;
use std::sync::Arc;

/// One recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: String,
    pub prompt: String,
}

/// Scripted provider: per-stage replies, a default reply, optional
/// failure injection, and a log of every prompt received.
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    replies: HashMap<String, String>,
    default_reply: String,
    fail_stages: HashMap<String, String>,
    calls: Vec<RecordedCall>,
}

impl FakeProvider {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.inner.lock().default_reply = "fake reply".to_string();
        fake
    }

    /// Reply with `text` whenever `stage` is called.
    pub fn reply_for(self, stage: &str, text: &str) -> Self {
        self.inner
            .lock()
            .replies
            .insert(stage.to_string(), text.to_string());
        self
    }

    pub fn default_reply(self, text: &str) -> Self {
        self.inner.lock().default_reply = text.to_string();
        self
    }

    /// Fail calls for `stage` with the given message.
    pub fn fail_for(self, stage: &str, message: &str) -> Self {
        self.inner
            .lock()
            .fail_stages
            .insert(stage.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, stage: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.stage == stage).count()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn call(&self, prompt: &str, stage: &str) -> Result<ProviderReply, ProviderError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RecordedCall {
            stage: stage.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(message) = inner.fail_stages.get(stage) {
            return Err(ProviderError::Api {
                provider: "fake",
                status: 500,
                body: message.clone(),
            });
        }

        let text = inner
            .replies
            .get(stage)
            .cloned()
            .unwrap_or_else(|| inner.default_reply.clone());

        Ok(ProviderReply {
            usage: UsageStats {
                input_tokens: prompt.len() as u64,
                output_tokens: text.len() as u64,
                cost: 0.0,
                model: "fake-model".to_string(),
                provider: "fake".to_string(),
                duration_ms: 1,
            },
            text,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
