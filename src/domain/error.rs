//! # Domain Errors
//!
//! Typed failures surfaced by the request gateway and the token feed subscriber.
//! Only exhausted or fatal conditions reach callers; transient failures are
//! retried and logged inside the components.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request to {endpoint} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },
    #[error("request queue is closed")]
    Closed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("failed to connect to feed: {0}")]
    Connect(String),
    #[error("feed transport error: {0}")]
    Transport(String),
    #[error("feed reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
    #[error("timed out after {waited:?} waiting for '{event_type}' event")]
    Timeout { event_type: String, waited: Duration },
    #[error("feed subscriber was shut down")]
    Closed,
}

impl SubscriberError {
    /// Whether the caller should show a "service unavailable" message.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SubscriberError::ReconnectExhausted { .. } | SubscriberError::Timeout { .. }
        )
    }
}
