// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider registry: config → concrete adapter.

use crate::anthropic::AnthropicProvider;
use crate::chat::{ChatCompletionsProvider, OLLAMA_DEFAULT_URL};
use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use tracing::info;

const KNOWN: &[&str] = &["anthropic", "openai", "ollama", "openrouter"];

/// Provider selection assembled from the flow document and environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Empty name means: auto-detect from environment.
    pub name: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderConfig {
    fn max_tokens(&self) -> u32 {
        env_parse("MAX_TOKENS").or(self.max_tokens).unwrap_or(4096)
    }

    fn temperature(&self) -> f64 {
        env_parse("TEMPERATURE").or(self.temperature).unwrap_or(0.7)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Build a provider from config, auto-detecting from environment when no
/// name is given: `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`,
/// `OPENROUTER_API_KEY`, then `OLLAMA_URL`.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = if config.name.is_empty() {
        detect_from_env().ok_or(ProviderError::NoneDetected)?
    } else {
        config.name.trim().to_lowercase()
    };

    let max_tokens = config.max_tokens();
    let temperature = config.temperature();
    let model = config.model.clone();

    let provider: Arc<dyn Provider> = match name.as_str() {
        "anthropic" => match &config.api_key {
            Some(key) => Arc::new(AnthropicProvider::new(
                key.clone(),
                model,
                max_tokens,
                temperature,
            )),
            None => Arc::new(AnthropicProvider::from_env(model, max_tokens, temperature)?),
        },
        "openai" => {
            let key = credential(config, "OPENAI_API_KEY", "openai")?;
            Arc::new(ChatCompletionsProvider::openai(
                key,
                model,
                max_tokens,
                temperature,
            ))
        }
        "openrouter" => {
            let key = credential(config, "OPENROUTER_API_KEY", "openrouter")?;
            Arc::new(ChatCompletionsProvider::openrouter(
                key,
                model,
                max_tokens,
                temperature,
            ))
        }
        "ollama" => {
            let base_url = config
                .base_url
                .clone()
                .or_else(|| std::env::var("OLLAMA_URL").ok())
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
            Arc::new(ChatCompletionsProvider::ollama(
                base_url,
                model,
                max_tokens,
                temperature,
            ))
        }
        other => {
            return Err(ProviderError::UnknownProvider {
                name: other.to_string(),
                available: KNOWN.join(", "),
            })
        }
    };

    info!(provider = provider.name(), model = provider.model(), "provider ready");
    Ok(provider)
}

fn credential(
    config: &ProviderConfig,
    variable: &'static str,
    provider: &'static str,
) -> Result<String, ProviderError> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }
    std::env::var(variable).map_err(|_| ProviderError::MissingCredential { provider, variable })
}

fn detect_from_env() -> Option<String> {
    for (variable, provider) in [
        ("ANTHROPIC_API_KEY", "anthropic"),
        ("OPENAI_API_KEY", "openai"),
        ("OPENROUTER_API_KEY", "openrouter"),
        ("OLLAMA_URL", "ollama"),
    ] {
        if std::env::var(variable).map(|v| !v.is_empty()).unwrap_or(false) {
            return Some(provider.to_string());
        }
    }
    None
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
