// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Anthropic Messages API adapter

use crate::pricing::calculate_cost;
use crate::provider::{Provider, ProviderError, ProviderReply};
use async_trait::async_trait;
use rein_core::UsageStats;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

const PROVIDER: &str = "anthropic";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
    temperature: f64,
    base_url: String,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: ApiUsage,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>, max_tokens: u32, temperature: f64) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
            temperature,
            base_url: API_URL.to_string(),
        }
    }

    pub fn from_env(
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<Self, ProviderError> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| ProviderError::MissingCredential {
                provider: PROVIDER,
                variable: "ANTHROPIC_API_KEY",
            })?;
        Ok(Self::new(api_key, model, max_tokens, temperature))
    }

    /// Override the endpoint (tests point this at a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn call(&self, prompt: &str, stage: &str) -> Result<ProviderReply, ProviderError> {
        let started = Instant::now();
        debug!(stage, model = %self.model, "anthropic call");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        let text = api_response
            .content
            .first()
            .and_then(|c| c.text.clone())
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })?;

        let usage = UsageStats {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
            cost: calculate_cost(
                &self.model,
                api_response.usage.input_tokens,
                api_response.usage.output_tokens,
            ),
            model: self.model.clone(),
            provider: PROVIDER.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        Ok(ProviderReply { text, usage })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}
