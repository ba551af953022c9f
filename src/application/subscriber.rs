//! # Feed Subscriber
//!
//! Keeps one connection to the token feed open, reconnects with exponential backoff,
//! and fans decoded events out to listeners registered per event type.
//!
//! Connection lifecycle: `Disconnected -> Connecting -> Connected`, back to
//! `Disconnected` on close or error. After `max_attempts` failed reconnects in a row
//! the subscriber settles in `Failed` and stops retrying until `connect` is called again.
//!
//! A single driver task owns the transport. Each reconnect opens a fresh transport;
//! `disconnect` bumps the generation so a stale driver can no longer touch shared state.

use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};

use crate::domain::error::SubscriberError;
use crate::domain::traits::{FeedConnector, FeedTransport};

/// Event type published for every token launch.
pub const NEW_TOKEN_EVENT: &str = "newToken";

pub type Listener = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Disconnected for good: automatic reconnects are exhausted.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Window for `await_next_event_of_type`
    pub await_timeout: Duration,
    /// Messages sent right after every successful connect
    pub handshake: Vec<Value>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
            await_timeout: Duration::from_secs(10),
            handshake: vec![json!({ "method": "subscribeNewToken" })],
        }
    }
}

impl SubscriberConfig {
    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

enum SessionEnd {
    Shutdown,
    Closed,
    Error(SubscriberError),
}

#[derive(Default)]
struct Control {
    generation: u64,
    driver_active: bool,
    shutdown: Option<watch::Sender<bool>>,
}

struct Shared {
    connector: Arc<dyn FeedConnector>,
    config: SubscriberConfig,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    state: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
    wake: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Publishes `state` only while `generation` is still the live driver.
    fn update(&self, generation: u64, state: ConnectionState) -> bool {
        let control = lock(&self.control);
        if control.generation != generation {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn handle_text(&self, text: &str) {
        let message: FeedMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("{}", crate::strings::logs::feed_malformed(&e.to_string()));
                return;
            }
        };
        self.dispatch(&message.kind, &message.data);
    }

    fn dispatch(&self, event_type: &str, data: &Value) {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<(ListenerId, Listener)> = lock(&self.listeners)
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        if listeners.is_empty() {
            tracing::debug!(event_type, "No listeners for feed event");
            return;
        }

        for (id, listener) in listeners {
            match std::panic::catch_unwind(AssertUnwindSafe(|| listener(data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(listener = id.0, "{}", crate::strings::logs::listener_failed(event_type, &e.to_string()));
                }
                Err(_) => {
                    tracing::error!(listener = id.0, "{}", crate::strings::logs::listener_failed(event_type, "panicked"));
                }
            }
        }
    }

    async fn session(
        &self,
        transport: &mut dyn FeedTransport,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        for message in &self.config.handshake {
            if let Err(e) = transport.send_text(message.to_string()).await {
                return SessionEnd::Error(e);
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => return SessionEnd::Shutdown,
                frame = transport.next_text() => match frame {
                    None => return SessionEnd::Closed,
                    Some(Err(e)) => return SessionEnd::Error(e),
                    Some(Ok(text)) => self.handle_text(&text),
                },
            }
        }
    }
}

/// Owns the transport for one generation until shutdown or reconnect exhaustion.
async fn drive(shared: Arc<Shared>, generation: u64, mut shutdown: watch::Receiver<bool>) {
    let mut attempts: u32 = 0;

    loop {
        if !shared.update(generation, ConnectionState::Connecting) {
            return;
        }

        let connected = tokio::select! {
            result = shared.connector.connect() => result,
            _ = shutdown.changed() => return,
        };

        match connected {
            Ok(mut transport) => {
                attempts = 0;
                if !shared.update(generation, ConnectionState::Connected) {
                    transport.close().await;
                    return;
                }
                tracing::info!("{}", crate::strings::logs::FEED_CONNECTED);

                match shared.session(transport.as_mut(), &mut shutdown).await {
                    SessionEnd::Shutdown => {
                        transport.close().await;
                        return;
                    }
                    SessionEnd::Closed => tracing::info!("{}", crate::strings::logs::FEED_CLOSED),
                    SessionEnd::Error(e) => {
                        tracing::warn!("{}", crate::strings::logs::feed_error(&e.to_string()))
                    }
                }
            }
            Err(e) => tracing::warn!("{}", crate::strings::logs::feed_error(&e.to_string())),
        }

        if !shared.update(generation, ConnectionState::Disconnected) {
            return;
        }

        if attempts >= shared.config.max_attempts {
            let mut control = lock(&shared.control);
            if control.generation == generation {
                control.driver_active = false;
                control.shutdown = None;
                shared.state.send_replace(ConnectionState::Failed);
                tracing::error!("{}", crate::strings::logs::feed_gave_up(attempts));
            }
            return;
        }

        attempts += 1;
        let delay = shared.config.backoff_delay(attempts);
        tracing::info!("{}", crate::strings::logs::feed_reconnecting(delay, attempts));

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.wake.notified() => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// Handle to the feed connection. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct EventSubscriber {
    shared: Arc<Shared>,
}

impl EventSubscriber {
    pub fn new(connector: Arc<dyn FeedConnector>, config: SubscriberConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                state,
                control: Mutex::new(Control::default()),
                wake: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// The terminal error once automatic reconnects are exhausted.
    pub fn failure(&self) -> Option<SubscriberError> {
        (self.state() == ConnectionState::Failed).then(|| SubscriberError::ReconnectExhausted {
            attempts: self.shared.config.max_attempts,
        })
    }

    /// Starts the connection. No-op while connecting or connected; while waiting out a
    /// backoff it skips the remaining delay instead of opening a second socket.
    pub fn connect(&self) {
        let mut control = lock(&self.shared.control);
        let state = *self.shared.state.borrow();

        if matches!(state, ConnectionState::Connecting | ConnectionState::Connected) {
            return;
        }
        if control.driver_active {
            self.shared.wake.notify_one();
            return;
        }

        control.generation += 1;
        control.driver_active = true;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        control.shutdown = Some(shutdown_tx);
        self.shared.state.send_replace(ConnectionState::Connecting);

        tracing::info!("{}", crate::strings::logs::FEED_CONNECTING);
        tokio::spawn(drive(self.shared.clone(), control.generation, shutdown_rx));
    }

    /// Closes the transport, drops every listener and stops reconnecting.
    pub fn disconnect(&self) {
        {
            let mut control = lock(&self.shared.control);
            control.generation += 1;
            control.driver_active = false;
            if let Some(shutdown) = control.shutdown.take() {
                let _ = shutdown.send(true);
            }
            self.shared.state.send_replace(ConnectionState::Disconnected);
        }
        lock(&self.shared.listeners).clear();
        tracing::info!("{}", crate::strings::logs::FEED_DISCONNECTED);
    }

    pub fn subscribe<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners)
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false when it was not registered.
    pub fn unsubscribe(&self, event_type: &str, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let Some(registered) = listeners.get_mut(event_type) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(existing, _)| *existing != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(event_type);
        }
        removed
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        lock(&self.shared.listeners)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Waits for the next `event_type` event within the configured window.
    pub async fn await_next_event_of_type(&self, event_type: &str) -> Result<Value, SubscriberError> {
        self.await_next_event_within(event_type, self.shared.config.await_timeout)
            .await
    }

    pub async fn await_next_event_within(
        &self,
        event_type: &str,
        window: Duration,
    ) -> Result<Value, SubscriberError> {
        if self.state() != ConnectionState::Connected {
            self.connect();
        }

        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let id = self.subscribe(event_type, move |data| {
            if let Some(tx) = lock(&slot).take() {
                let _ = tx.send(data.clone());
            }
            Ok(())
        });
        let _registration = Registration {
            subscriber: self,
            event_type,
            id,
        };

        let mut states = self.state_changes();
        let failed = async move {
            loop {
                if *states.borrow_and_update() == ConnectionState::Failed {
                    break;
                }
                if states.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            outcome = tokio::time::timeout(window, rx) => match outcome {
                Ok(Ok(data)) => Ok(data),
                // The listener was dropped by `disconnect`.
                Ok(Err(_)) => Err(SubscriberError::Closed),
                Err(_) => Err(SubscriberError::Timeout {
                    event_type: event_type.to_string(),
                    waited: window,
                }),
            },
            _ = failed => Err(SubscriberError::ReconnectExhausted {
                attempts: self.shared.config.max_attempts,
            }),
        }
    }
}

/// Unregisters a one-shot listener however the wait ends.
struct Registration<'a> {
    subscriber: &'a EventSubscriber,
    event_type: &'a str,
    id: ListenerId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.subscriber.unsubscribe(self.event_type, self.id);
    }
}
