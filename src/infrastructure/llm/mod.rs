//! Simple LLM API wrapper for OpenAI-compatible providers
//!
//! ```rust,ignore
//! let client = Client::new("openai", &config.agents["openai"])?;
//! let answer = client.prompt(AnalysisMode::Chat, "What is a rug pull?").await?;
//! println!("{}", answer.content);
//! ```

mod client;
pub mod providers;
mod types;

pub use client::Client;

pub use types::{Context, Error, Provider, Response};
