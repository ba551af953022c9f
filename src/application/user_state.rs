//! # Conversation State
//!
//! Per-user record of what free-text input the bot expects next (`UserStateKind`),
//! plus an open bag of auxiliary data accumulated while a flow is in progress.
//!
//! States expire after a fixed TTL. Every `set_state` schedules a timer task that is
//! aborted when the state is replaced or cleared. A background sweep also clears
//! states whose expiry instant has passed, and reads treat an elapsed state as absent.
//!
//! Auxiliary data outlives state changes. It is only dropped by `clear_pending_data`
//! (explicitly, or through `set_menu_state` when moving to a non-input state).

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use crate::domain::types::UserStateKind;

pub type UserData = Map<String, Value>;

/// Transient keys removed by `clear_pending_data`.
pub const PENDING_KEYS: [&str; 3] = ["pending_loans", "pending_network", "pending_transfer"];
pub const NETWORK_KEY: &str = "network";
pub const WALLET_ADDRESS_KEY: &str = "wallet_address";

const DEFAULT_NETWORK: &str = "ethereum";

#[derive(Debug, Clone)]
pub struct StateStoreConfig {
    /// How long a state lives without being renewed.
    pub ttl: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(15 * 60),
        }
    }
}

/// Snapshot used by menus to decide what to render.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    pub is_waiting_for_input: bool,
    pub current_state: Option<UserStateKind>,
    pub network: String,
    /// Time left before the current state lapses.
    pub expires_in: Option<Duration>,
}

struct StateEntry {
    kind: UserStateKind,
    expires_at: Instant,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Inner {
    states: HashMap<String, StateEntry>,
    data: HashMap<String, UserData>,
    messages: HashMap<String, Vec<String>>,
}

impl Inner {
    fn clear_state(&mut self, user_id: &str) -> bool {
        self.messages.remove(user_id);
        match self.states.remove(user_id) {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    fn is_expired(&self, user_id: &str, now: Instant) -> bool {
        self.states
            .get(user_id)
            .is_some_and(|entry| entry.expires_at <= now)
    }
}

/// In-memory conversation state for every user. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
    config: StateStoreConfig,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateStore {
    pub fn new(config: StateStoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            config,
        }
    }

    /// Records `state` as the user's current state and restarts its expiry timer.
    pub fn set_state(&self, user_id: &str, state: UserStateKind) {
        let expires_at = Instant::now() + self.config.ttl;
        let timer = self.spawn_expiry(user_id, expires_at);

        let mut guard = lock(&self.inner);
        let previous = guard.states.insert(
            user_id.to_string(),
            StateEntry {
                kind: state,
                expires_at,
                timer,
            },
        );
        if let Some(old) = previous {
            if let Some(old_timer) = old.timer {
                old_timer.abort();
            }
            tracing::debug!(user = user_id, from = %old.kind, to = %state, "Conversation state replaced");
        } else {
            tracing::debug!(user = user_id, to = %state, "Conversation state set");
        }
    }

    fn spawn_expiry(&self, user_id: &str, expires_at: Instant) -> Option<AbortHandle> {
        // Without a runtime the state still expires lazily on read and in the sweep.
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let user = user_id.to_string();

        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut guard = lock(&inner);
            if guard.is_expired(&user, Instant::now()) {
                guard.clear_state(&user);
                tracing::info!(user = %user, "Conversation state expired");
            }
        });
        Some(handle.abort_handle())
    }

    /// Current state, or `None` when idle or expired.
    pub fn get_state(&self, user_id: &str) -> Option<UserStateKind> {
        let mut guard = lock(&self.inner);
        if guard.is_expired(user_id, Instant::now()) {
            guard.clear_state(user_id);
            return None;
        }
        guard.states.get(user_id).map(|entry| entry.kind)
    }

    pub fn expires_at(&self, user_id: &str) -> Option<Instant> {
        lock(&self.inner).states.get(user_id).map(|e| e.expires_at)
    }

    /// Removes the state and cancels its timer. Auxiliary data is kept.
    pub fn clear_user_state(&self, user_id: &str) {
        if lock(&self.inner).clear_state(user_id) {
            tracing::debug!(user = user_id, "Conversation state cleared");
        }
    }

    /// Shallow-merges `partial` into the user's data, creating it if needed.
    pub fn set_user_data(&self, user_id: &str, partial: UserData) {
        let mut guard = lock(&self.inner);
        let data = guard.data.entry(user_id.to_string()).or_default();
        for (key, value) in partial {
            data.insert(key, value);
        }
    }

    pub fn set_user_value(&self, user_id: &str, key: &str, value: Value) {
        let mut partial = UserData::new();
        partial.insert(key.to_string(), value);
        self.set_user_data(user_id, partial);
    }

    pub fn get_user_data(&self, user_id: &str) -> Option<UserData> {
        lock(&self.inner).data.get(user_id).cloned()
    }

    pub fn get_user_value(&self, user_id: &str, key: &str) -> Option<Value> {
        lock(&self.inner)
            .data
            .get(user_id)
            .and_then(|data| data.get(key).cloned())
    }

    /// Drops the pending-operation records, leaving unrelated keys alone.
    pub fn clear_pending_data(&self, user_id: &str) {
        let mut guard = lock(&self.inner);
        if let Some(data) = guard.data.get_mut(user_id) {
            for key in PENDING_KEYS {
                data.remove(key);
            }
        }
    }

    /// Whether a state routes the user's next free text to the AI/analysis layer.
    pub fn is_ai_required(state: UserStateKind) -> bool {
        state.requires_ai()
    }

    pub fn is_configured(&self, user_id: &str) -> bool {
        self.get_user_value(user_id, WALLET_ADDRESS_KEY)
            .is_some_and(|v| v.as_str().is_some_and(|s| !s.is_empty()))
    }

    /// Remembers a menu message posted to the user; forgotten when the state clears.
    pub fn track_message(&self, user_id: &str, message_id: &str) {
        let mut guard = lock(&self.inner);
        let ids = guard.messages.entry(user_id.to_string()).or_default();
        if !ids.iter().any(|id| id == message_id) {
            ids.push(message_id.to_string());
        }
    }

    pub fn tracked_messages(&self, user_id: &str) -> Vec<String> {
        lock(&self.inner)
            .messages
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn menu_state(&self, user_id: &str) -> MenuState {
        let current_state = self.get_state(user_id);
        let network = self
            .get_user_value(user_id, NETWORK_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let expires_in = self
            .expires_at(user_id)
            .map(|at| at.saturating_duration_since(Instant::now()));
        MenuState {
            is_waiting_for_input: current_state.is_some_and(Self::is_ai_required),
            current_state,
            network,
            expires_in,
        }
    }

    /// Sets a menu state; non-input states also drop pending data.
    pub fn set_menu_state(&self, user_id: &str, state: UserStateKind) {
        self.set_state(user_id, state);
        if !Self::is_ai_required(state) {
            self.clear_pending_data(user_id);
        }
    }

    /// Clears every state whose expiry instant has passed. Returns how many were cleared.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = lock(&self.inner);
        let expired: Vec<String> = guard
            .states
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &expired {
            guard.clear_state(user);
        }
        expired.len()
    }

    /// Number of users with a stored (possibly not yet swept) state.
    pub fn active_states(&self) -> usize {
        lock(&self.inner).states.len()
    }

    /// Runs `sweep_expired` every `sweep_interval` until the store is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let store_config = self.config.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store_config.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let store = StateStore {
                    inner,
                    config: store_config.clone(),
                };
                let cleared = store.sweep_expired();
                if cleared > 0 {
                    tracing::info!("{}", crate::strings::logs::sweep_cleared(cleared));
                }
            }
        })
    }
}
