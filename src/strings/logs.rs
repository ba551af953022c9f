use std::time::Duration;

pub const CONFIG_READ_ERROR: &str = "Failed to read config.yaml";
pub const CONFIG_PARSE_ERROR: &str = "Failed to parse YAML";

pub const STARTING: &str = "Starting trenchbot...";
pub const SYNC_LOOP_START: &str = "Starting sync loop...";
pub const SHUTDOWN: &str = "Shutting down...";

pub fn logged_in(user: &str) -> String {
    format!("Logged in as {user}")
}

pub fn set_display_name_fail(err: &str) -> String {
    format!("Failed to set display name: {err}")
}

pub fn sync_loop_fail(err: &str) -> String {
    format!("Sync loop failed: {err}")
}

pub fn shutdown_fail(err: &str) -> String {
    format!("Unable to listen for shutdown signal: {err}")
}

pub fn invite_received(room_id: &str) -> String {
    format!("💌 Received invite for room {room_id:?}")
}

pub fn join_invite_fail(err: &str) -> String {
    format!("Failed to join room after invite: {err}")
}

pub fn route_fail(err: &str) -> String {
    format!("Failed to route message: {err}")
}

// Conversation state

pub fn sweep_cleared(count: usize) -> String {
    format!("State sweep cleared {count} expired conversation(s)")
}

// Request gateway

pub fn request_failed(endpoint: &str, attempt: u32, attempts: u32, err: &str) -> String {
    format!("Request to {endpoint} failed (Attempt {attempt}/{attempts}): {err}")
}

pub fn request_recovered(endpoint: &str, attempt: u32) -> String {
    format!("Request to {endpoint} succeeded on attempt {attempt}")
}

pub fn request_exhausted(endpoint: &str, attempts: u32) -> String {
    format!("Request to {endpoint} gave up after {attempts} attempts")
}

// Token feed

pub const FEED_CONNECTING: &str = "Connecting to token feed...";
pub const FEED_CONNECTED: &str = "Connected to token feed";
pub const FEED_CLOSED: &str = "Token feed connection closed";
pub const FEED_DISCONNECTED: &str = "Token feed disconnected";

pub fn feed_error(err: &str) -> String {
    format!("Token feed error: {err}")
}

pub fn feed_malformed(err: &str) -> String {
    format!("Discarding malformed feed message: {err}")
}

pub fn feed_reconnecting(delay: Duration, attempt: u32) -> String {
    format!(
        "Reconnecting to token feed in {}ms... (attempt {attempt})",
        delay.as_millis()
    )
}

pub fn feed_gave_up(attempts: u32) -> String {
    format!("Max reconnection attempts reached ({attempts}), token feed stopped")
}

pub fn listener_failed(event_type: &str, err: &str) -> String {
    format!("Feed listener for '{event_type}' failed: {err}")
}
