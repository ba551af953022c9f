//! # Configuration
//!
//! Manages the loading and parsing of the application's configuration file (`config.yaml`).
//! Defines the structs for service credentials, LLM agents and the timing knobs of the
//! conversation store, the request gateway and the token feed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::application::gateway::GatewayConfig;
use crate::application::subscriber::SubscriberConfig;
use crate::application::user_state::StateStoreConfig;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub services: ServicesConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub system: SystemConfig,
}

impl AppConfig {
    /// Reads and parses the YAML configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("{} ({})", crate::strings::logs::CONFIG_READ_ERROR, path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context(crate::strings::logs::CONFIG_PARSE_ERROR)
    }
}

/// System-level settings for the bot.
#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub default_agent: Option<String>,
    #[serde(default = "default_network")]
    pub default_network: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_agent: None,
            default_network: default_network(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_network() -> String {
    "ethereum".to_string()
}

/// Configuration for the connected services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub dextools: DexToolsConfig,
    #[serde(default)]
    pub pumpportal: PumpPortalConfig,
}

/// Specific configuration for the Matrix service.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixConfig {
    pub username: String,
    pub password: String,
    pub homeserver: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DexToolsConfig {
    #[serde(default = "default_dextools_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>, // e.g. "DEXTOOLS_API_KEY"
    #[serde(default = "default_dextools_timeout")]
    pub timeout_secs: u64,
}

impl Default for DexToolsConfig {
    fn default() -> Self {
        Self {
            base_url: default_dextools_url(),
            api_key: None,
            api_key_env: None,
            timeout_secs: default_dextools_timeout(),
        }
    }
}

impl DexToolsConfig {
    /// Resolves the API key, preferring the literal value over the env var.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_secret(self.api_key.as_deref(), self.api_key_env.as_deref(), "dextools")
    }
}

fn default_dextools_url() -> String {
    "https://public-api.dextools.io/trial/v2".to_string()
}

fn default_dextools_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PumpPortalConfig {
    #[serde(default = "default_pumpportal_url")]
    pub url: String,
}

impl Default for PumpPortalConfig {
    fn default() -> Self {
        Self {
            url: default_pumpportal_url(),
        }
    }
}

fn default_pumpportal_url() -> String {
    "wss://pumpportal.fun/api/data".to_string()
}

pub type AgentsConfig = HashMap<String, AgentConfig>;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>, // e.g. "OPENAI_API_KEY"
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Expiry settings for per-user conversation state.
#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
    #[serde(default = "default_sweep_minutes")]
    pub sweep_minutes: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            sweep_minutes: default_sweep_minutes(),
        }
    }
}

impl From<&ConversationConfig> for StateStoreConfig {
    fn from(c: &ConversationConfig) -> Self {
        Self {
            ttl: Duration::from_secs(c.ttl_minutes * 60),
            sweep_interval: Duration::from_secs(c.sweep_minutes * 60),
        }
    }
}

fn default_ttl_minutes() -> u64 {
    30
}
fn default_sweep_minutes() -> u64 {
    15
}

/// Throttling and retry settings for the DexTools request queue.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_timeout_ms")]
    pub min_timeout_ms: u64,
    #[serde(default)]
    pub exponential_backoff: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_retries: default_max_retries(),
            min_timeout_ms: default_min_timeout_ms(),
            exponential_backoff: false,
        }
    }
}

impl From<&GatewaySettings> for GatewayConfig {
    fn from(s: &GatewaySettings) -> Self {
        Self {
            interval: Duration::from_millis(s.interval_ms),
            max_retries: s.max_retries,
            min_timeout: Duration::from_millis(s.min_timeout_ms),
            exponential_backoff: s.exponential_backoff,
        }
    }
}

fn default_interval_ms() -> u64 {
    2000
}
fn default_max_retries() -> u32 {
    3
}
fn default_min_timeout_ms() -> u64 {
    2000
}

/// Reconnect and wait settings for the token feed.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_await_timeout_secs")]
    pub await_timeout_secs: u64,
    #[serde(default = "default_watch_minutes")]
    pub watch_minutes: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            await_timeout_secs: default_await_timeout_secs(),
            watch_minutes: default_watch_minutes(),
        }
    }
}

impl From<&FeedSettings> for SubscriberConfig {
    fn from(s: &FeedSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            max_attempts: s.max_attempts,
            await_timeout: Duration::from_secs(s.await_timeout_secs),
            ..SubscriberConfig::default()
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_await_timeout_secs() -> u64 {
    10
}
fn default_watch_minutes() -> u64 {
    5
}

/// Picks a literal secret, falling back to the named env var.
pub fn resolve_secret(literal: Option<&str>, env_var: Option<&str>, owner: &str) -> Result<String> {
    if let Some(key) = literal {
        return Ok(key.to_string());
    }
    if let Some(var) = env_var {
        return std::env::var(var).with_context(|| format!("{owner}: env var {var} not set"));
    }
    anyhow::bail!("{owner}: no API key provided - set api_key or api_key_env")
}
