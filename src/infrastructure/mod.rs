//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (e.g., ChatProvider, LlmProvider, FeedConnector).

pub mod dextools;
pub mod llm;
pub mod matrix;
pub mod pumpportal;
