// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI-compatible chat-completions adapter.
//!
//! Serves three backends that share the same wire format: OpenAI itself,
//! OpenRouter, and a local Ollama endpoint.

use crate::pricing::calculate_cost;
use crate::provider::{Provider, ProviderError, ProviderReply};
use async_trait::async_trait;
use rein_core::UsageStats;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434/v1/chat/completions";

/// Chat-completions client parameterized by endpoint and provider label.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    provider_name: &'static str,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ApiUsage,
}

impl ChatCompletionsProvider {
    pub fn openai(
        api_key: String,
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self::new(
            "openai",
            OPENAI_URL,
            Some(api_key),
            model.unwrap_or_else(|| "gpt-4o".to_string()),
            max_tokens,
            temperature,
        )
    }

    pub fn openrouter(
        api_key: String,
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self::new(
            "openrouter",
            OPENROUTER_URL,
            Some(api_key),
            model.unwrap_or_else(|| "anthropic/claude-sonnet-4".to_string()),
            max_tokens,
            temperature,
        )
    }

    /// Local Ollama endpoint; no credential required.
    pub fn ollama(base_url: String, model: Option<String>, max_tokens: u32, temperature: f64) -> Self {
        Self::new(
            "ollama",
            base_url,
            None,
            model.unwrap_or_else(|| "llama3".to_string()),
            max_tokens,
            temperature,
        )
    }

    fn new(
        provider_name: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            provider_name,
            base_url: base_url.into(),
            api_key,
            client: reqwest::Client::new(),
            model,
            max_tokens,
            temperature,
        }
    }

    /// Override the endpoint (tests point this at a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    async fn call(&self, prompt: &str, stage: &str) -> Result<ProviderReply, ProviderError> {
        let started = Instant::now();
        debug!(stage, provider = self.provider_name, model = %self.model, "chat call");

        let mut request = self.client.post(&self.base_url).json(&serde_json::json!({
            "model": &self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|source| ProviderError::Request {
            provider: self.provider_name,
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: self.provider_name,
                status,
                body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|source| ProviderError::Request {
                provider: self.provider_name,
                source,
            })?;

        let text = api_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(ProviderError::EmptyResponse {
                provider: self.provider_name,
            })?;

        let usage = UsageStats {
            input_tokens: api_response.usage.prompt_tokens,
            output_tokens: api_response.usage.completion_tokens,
            cost: calculate_cost(
                &self.model,
                api_response.usage.prompt_tokens,
                api_response.usage.completion_tokens,
            ),
            model: self.model.clone(),
            provider: self.provider_name.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        Ok(ProviderReply { text, usage })
    }

    fn name(&self) -> &str {
        self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
