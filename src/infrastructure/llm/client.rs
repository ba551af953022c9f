//! # LLM Client
//!
//! Provides the `Client` struct, the entry point for AI answers. It resolves the
//! configured agent once, then answers prompts with the system prompt that matches
//! the conversation's `AnalysisMode`.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::config::AgentConfig;
use crate::domain::traits::LlmProvider;
use crate::domain::types::AnalysisMode;
use crate::infrastructure::llm::providers::{self, ProviderConfig};
use crate::infrastructure::llm::{Context, Error, Response};

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// Simple LLM client
pub struct Client {
    agent_name: String,
    provider: ProviderConfig,
    http: reqwest::Client,
}

impl Client {
    /// Create a client for one named agent
    pub fn new(agent_name: &str, agent: &AgentConfig) -> Result<Self, Error> {
        let provider = ProviderConfig::from_agent_config(agent)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(agent.timeout.unwrap_or(120)))
            .build()
            .map_err(|e| Error::new(provider.provider.as_str(), e.to_string()))?;

        Ok(Self {
            agent_name: agent_name.to_string(),
            provider,
            http,
        })
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Send `prompt` with the system prompt of `mode`
    pub async fn prompt(&self, mode: AnalysisMode, prompt: &str) -> Result<Response, Error> {
        let context = Context::new()
            .add_system_message(crate::strings::prompts::system_prompt(mode))
            .add_user_message(prompt)
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let response = providers::chat(&self.http, &self.provider, context).await?;
        tracing::debug!(
            agent = %self.agent_name,
            model = %response.model,
            tokens = response.total_tokens,
            "LLM completion finished"
        );
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for Client {
    async fn completion(&self, mode: AnalysisMode, prompt: &str) -> Result<String, String> {
        self.prompt(mode, prompt).await.map(|r| r.content).map_err(|e| {
            if e.is_rate_limited() {
                tracing::warn!("{}", e);
                crate::strings::messages::AI_BUSY.to_string()
            } else {
                e.to_string()
            }
        })
    }
}
