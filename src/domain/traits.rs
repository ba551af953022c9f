//! # Domain Traits
//!
//! Abstract interfaces for core system components (Chat, LLM, token feed socket).
//! Allows for pluggable implementations in the Infrastructure layer.

use async_trait::async_trait;

use crate::domain::error::SubscriberError;
use crate::domain::types::{AnalysisMode, Network, TrendingToken};

/// Abstract interface for a Chat Provider (e.g., Matrix, Console)
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a message to the room
    async fn send_message(&self, content: &str) -> Result<String, String>;

    /// Send a notification (not tracked)
    async fn send_notification(&self, content: &str) -> Result<(), String>;

    /// Send a typing indicator
    async fn typing(&self, active: bool) -> Result<(), String>;

    /// Get the current room ID
    fn room_id(&self) -> String;
}

/// Abstract interface for an LLM Provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt` using the system prompt of `mode`.
    async fn completion(&self, mode: AnalysisMode, prompt: &str) -> Result<String, String>;
}

/// Token market data (DexTools in production).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Hottest pools on `network`, best first.
    async fn trending(&self, network: Network) -> anyhow::Result<Vec<TrendingToken>>;

    /// Latest USD price of the token's oldest pool.
    async fn token_price(&self, network: Network, address: &str) -> anyhow::Result<f64>;

    /// Rendered security/liquidity report for a token.
    async fn token_report(&self, network: Network, address: &str) -> anyhow::Result<String>;
}

/// An open duplex connection to the push feed.
#[async_trait]
pub trait FeedTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SubscriberError>;

    /// Next inbound text frame; `None` once the peer closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, SubscriberError>>;

    async fn close(&mut self);
}

/// Opens fresh feed connections. Called once per (re)connect cycle.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FeedTransport>, SubscriberError>;
}
