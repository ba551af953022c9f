//! # Application Layer
//!
//! Contains the core business logic and orchestration of the bot.
//! This includes conversation state, the request gateway, the token feed and command routing.

pub mod gateway;
pub mod router;
pub mod subscriber;
pub mod user_state;
