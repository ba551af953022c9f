//! # Strings Module
//!
//! Centralizes user-facing strings, prompts, log lines and help text.

pub mod help;
pub mod logs;
pub mod messages;
pub mod prompts;
