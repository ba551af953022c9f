//! # LLM Providers
//!
//! Every supported provider speaks the OpenAI chat completions dialect; they differ
//! only in base URL and default model.

mod openai;

use crate::domain::config::{AgentConfig, resolve_secret};
use crate::infrastructure::llm::{Context, Error, Provider, Response};

/// Configuration for a provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// API key
    pub api_key: String,
    /// Base URL, the provider default unless overridden by the agent
    pub base_url: String,
    /// Default model
    pub default_model: String,
}

impl ProviderConfig {
    pub fn from_agent_config(config: &AgentConfig) -> Result<Self, Error> {
        let provider = Provider::from_str(&config.provider)
            .ok_or_else(|| Error::new(&config.provider, "Unknown provider"))?;

        let api_key = resolve_secret(
            config.api_key.as_deref(),
            config.api_key_env.as_deref(),
            provider.as_str(),
        )
        .map_err(|e| Error::new(provider.as_str(), e.to_string()))?;

        let default_model = if config.model.is_empty() {
            provider.default_model().to_string()
        } else {
            config.model.clone()
        };

        Ok(Self {
            provider,
            api_key,
            base_url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            default_model,
        })
    }
}

/// Execute a chat request with the configured provider
pub async fn chat(
    http: &reqwest::Client,
    config: &ProviderConfig,
    context: Context,
) -> Result<Response, Error> {
    openai::chat(http, config, context).await
}
