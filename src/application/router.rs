//! # Command Router
//!
//! Routes incoming messages to the matching handler. Dot-prefixed messages are
//! commands; free text is routed by the sender's conversation state, and messages
//! starting with the wake phrase always go to the LLM.

use anyhow::Result;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::application::subscriber::{EventSubscriber, ListenerId, NEW_TOKEN_EVENT};
use crate::application::user_state::{NETWORK_KEY, StateStore};
use crate::domain::error::{GatewayError, SubscriberError};
use crate::domain::traits::{ChatProvider, LlmProvider, MarketDataProvider};
use crate::domain::types::{AnalysisMode, Network, UserStateKind};
use crate::strings::{help, messages};

const WAKE_PHRASE: &str = "hey kats";

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// How long a `.watch` session streams new tokens.
    pub watch_duration: Duration,
    /// Network used until a user picks one with `.network`.
    pub default_network: Network,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            watch_duration: Duration::from_secs(5 * 60),
            default_network: Network::Ethereum,
        }
    }
}

struct Watch {
    listener: ListenerId,
    timer: AbortHandle,
}

/// Live `.watch` sessions keyed by user.
#[derive(Clone)]
struct Watches {
    active: Arc<Mutex<HashMap<String, Watch>>>,
    feed: EventSubscriber,
    store: StateStore,
}

impl Watches {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Watch>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contains(&self, user_id: &str) -> bool {
        self.lock().contains_key(user_id)
    }

    /// Ends a session. Returns its timer so a manual stop can abort it.
    fn end(&self, user_id: &str) -> Option<AbortHandle> {
        let watch = self.lock().remove(user_id)?;
        self.feed.unsubscribe(NEW_TOKEN_EVENT, watch.listener);
        if self.store.get_state(user_id) == Some(UserStateKind::WatchingPumpTokens) {
            self.store.clear_user_state(user_id);
        }
        Some(watch.timer)
    }
}

pub struct CommandRouter {
    store: StateStore,
    llm: Arc<dyn LlmProvider>,
    market: Arc<dyn MarketDataProvider>,
    feed: EventSubscriber,
    settings: RouterSettings,
    watches: Watches,
}

impl CommandRouter {
    pub fn new(
        store: StateStore,
        llm: Arc<dyn LlmProvider>,
        market: Arc<dyn MarketDataProvider>,
        feed: EventSubscriber,
        settings: RouterSettings,
    ) -> Self {
        let watches = Watches {
            active: Arc::default(),
            feed: feed.clone(),
            store: store.clone(),
        };
        Self {
            store,
            llm,
            market,
            feed,
            settings,
            watches,
        }
    }

    pub async fn route<C>(&self, chat: &C, message: &str, sender: &str) -> Result<()>
    where
        C: ChatProvider + Clone + Send + Sync + 'static,
    {
        let msg = message.trim();
        if msg.is_empty() {
            return Ok(());
        }

        if let Some(question) = strip_wake_phrase(msg) {
            let prompt = if question.is_empty() { msg } else { question };
            return self.ask(chat, AnalysisMode::Chat, prompt).await;
        }

        if !msg.starts_with('.') {
            return self.handle_input(chat, msg, sender).await;
        }

        let (cmd, args) = match msg.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (msg, ""),
        };
        tracing::info!(
            "Router dispatching cmd='{}' args='{}' sender='{}'",
            cmd,
            args,
            sender
        );

        match cmd.to_lowercase().as_str() {
            ".help" => {
                let _ = chat.send_message(help::MAIN).await;
            }
            ".menu" | ".start" => self.show_menu(chat, sender).await,
            ".cancel" => {
                if let Some(timer) = self.watches.end(sender) {
                    timer.abort();
                }
                self.store.clear_pending_data(sender);
                self.store.clear_user_state(sender);
                let _ = chat.send_message(messages::CANCELLED).await;
            }
            ".scan" => {
                if args.is_empty() {
                    self.prompt_for(chat, sender, UserStateKind::WaitingScanInput, messages::SCAN_PROMPT)
                        .await;
                } else {
                    self.scan(chat, sender, args).await;
                }
            }
            ".meme" => {
                self.ai_command(chat, sender, args, UserStateKind::WaitingMemeInput, messages::MEME_PROMPT)
                    .await?
            }
            ".invest" => {
                self.ai_command(
                    chat,
                    sender,
                    args,
                    UserStateKind::WaitingInvestmentInput,
                    messages::INVEST_PROMPT,
                )
                .await?
            }
            ".report" => {
                self.ai_command(chat, sender, args, UserStateKind::WaitingReportInput, messages::REPORT_PROMPT)
                    .await?
            }
            ".trending" => self.trending(chat, sender, args).await,
            ".price" => self.price(chat, sender, args).await,
            ".network" => self.set_network(chat, sender, args).await,
            ".pump" => self.pump(chat).await,
            ".watch" => self.watch(chat, sender).await,
            ".unwatch" => match self.watches.end(sender) {
                Some(timer) => {
                    timer.abort();
                    let _ = chat.send_message(messages::WATCH_ENDED).await;
                }
                None => {
                    let _ = chat.send_notification(messages::NOT_WATCHING).await;
                }
            },
            ".status" => {
                let mut menu = self.store.menu_state(sender);
                menu.network = self.user_network(sender).as_str().to_string();
                let status = messages::status(&menu, self.feed.state().as_str());
                let _ = chat.send_message(&status).await;
            }
            _ => {
                let _ = chat.send_notification(messages::UNKNOWN_COMMAND).await;
            }
        }

        Ok(())
    }

    /// Free text: answered only when the sender's state expects input.
    async fn handle_input<C: ChatProvider>(&self, chat: &C, msg: &str, sender: &str) -> Result<()> {
        let Some(state) = self.store.get_state(sender) else {
            return Ok(());
        };
        if !StateStore::is_ai_required(state) {
            return Ok(());
        }

        match state {
            UserStateKind::WaitingScanInput => {
                self.store.clear_user_state(sender);
                self.scan(chat, sender, msg).await;
            }
            // The watch session owns this state until it ends.
            UserStateKind::WatchingPumpTokens => {
                self.ask(chat, AnalysisMode::Chat, msg).await?;
            }
            _ => {
                self.store.clear_user_state(sender);
                self.ask(chat, state.analysis_mode(), msg).await?;
            }
        }
        Ok(())
    }

    async fn show_menu<C: ChatProvider>(&self, chat: &C, sender: &str) {
        self.store.set_menu_state(sender, UserStateKind::MainMenu);
        let network = self.user_network(sender);
        if let Ok(id) = chat.send_message(&messages::main_menu(network.display_name())).await {
            self.store.track_message(sender, &id);
        }
    }

    async fn prompt_for<C: ChatProvider>(&self, chat: &C, sender: &str, state: UserStateKind, prompt: &str) {
        self.store.set_menu_state(sender, state);
        if let Ok(id) = chat.send_message(prompt).await {
            self.store.track_message(sender, &id);
        }
    }

    async fn ai_command<C: ChatProvider>(
        &self,
        chat: &C,
        sender: &str,
        args: &str,
        state: UserStateKind,
        prompt: &str,
    ) -> Result<()> {
        if args.is_empty() {
            self.prompt_for(chat, sender, state, prompt).await;
            Ok(())
        } else {
            self.ask(chat, state.analysis_mode(), args).await
        }
    }

    async fn ask<C: ChatProvider>(&self, chat: &C, mode: AnalysisMode, prompt: &str) -> Result<()> {
        let _ = chat.typing(true).await;
        let answer = self.llm.completion(mode, prompt).await;
        let _ = chat.typing(false).await;

        match answer {
            Ok(text) => {
                let _ = chat.send_message(&text).await;
            }
            Err(e) => {
                tracing::error!("LLM completion failed: {}", e);
                let _ = chat.send_notification(&messages::task_failed(&e)).await;
            }
        }
        Ok(())
    }

    async fn scan<C: ChatProvider>(&self, chat: &C, sender: &str, address: &str) {
        let network = self.user_network(sender);
        let _ = chat.send_notification(messages::ANALYSING).await;
        let _ = chat.typing(true).await;
        let report = self.market.token_report(network, address).await;
        let _ = chat.typing(false).await;

        match report {
            Ok(report) => {
                let _ = chat.send_message(&report).await;
            }
            Err(e) => self.report_failure(chat, &e).await,
        }
    }

    async fn trending<C: ChatProvider>(&self, chat: &C, sender: &str, args: &str) {
        let network = if args.is_empty() {
            self.user_network(sender)
        } else {
            match Network::from_str(args) {
                Some(network) => network,
                None => {
                    let _ = chat.send_notification(&messages::unknown_network(args)).await;
                    return;
                }
            }
        };

        let _ = chat.send_notification(&messages::trending_loading(network)).await;
        match self.market.trending(network).await {
            Ok(tokens) => {
                let _ = chat.send_message(&messages::trending(network, &tokens)).await;
            }
            Err(e) => self.report_failure(chat, &e).await,
        }
    }

    async fn price<C: ChatProvider>(&self, chat: &C, sender: &str, address: &str) {
        if address.is_empty() {
            let _ = chat.send_notification(messages::PRICE_USAGE).await;
            return;
        }
        let network = self.user_network(sender);
        match self.market.token_price(network, address).await {
            Ok(price) => {
                let _ = chat.send_message(&messages::token_price(network, address, price)).await;
            }
            Err(e) => self.report_failure(chat, &e).await,
        }
    }

    async fn set_network<C: ChatProvider>(&self, chat: &C, sender: &str, args: &str) {
        if args.is_empty() {
            let _ = chat.send_notification(messages::NETWORK_USAGE).await;
            return;
        }
        match Network::from_str(args) {
            Some(network) => {
                self.store
                    .set_user_value(sender, NETWORK_KEY, json!(network.as_str()));
                let _ = chat.send_message(&messages::network_set(network)).await;
            }
            None => {
                let _ = chat.send_notification(&messages::unknown_network(args)).await;
            }
        }
    }

    async fn pump<C: ChatProvider>(&self, chat: &C) {
        let _ = chat.typing(true).await;
        let event = self.feed.await_next_event_of_type(NEW_TOKEN_EVENT).await;
        let _ = chat.typing(false).await;

        match event {
            Ok(token) => {
                let _ = chat.send_message(&messages::new_token(&token)).await;
            }
            Err(e) => self.report_failure(chat, &anyhow::Error::from(e)).await,
        }
    }

    async fn watch<C>(&self, chat: &C, sender: &str)
    where
        C: ChatProvider + Clone + Send + Sync + 'static,
    {
        if self.watches.contains(sender) {
            let _ = chat.send_notification(messages::ALREADY_WATCHING).await;
            return;
        }

        self.store
            .set_menu_state(sender, UserStateKind::WatchingPumpTokens);
        self.feed.connect();

        let room = chat.clone();
        let listener = self.feed.subscribe(NEW_TOKEN_EVENT, move |token| {
            let room = room.clone();
            let text = messages::new_token(token);
            tokio::spawn(async move {
                if let Err(e) = room.send_notification(&text).await {
                    tracing::warn!("Failed to post new token: {}", e);
                }
            });
            Ok(())
        });

        let watches = self.watches.clone();
        let user = sender.to_string();
        let room = chat.clone();
        let duration = self.settings.watch_duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if watches.end(&user).is_some() {
                let _ = room.send_message(messages::WATCH_ENDED).await;
            }
        })
        .abort_handle();

        self.watches
            .lock()
            .insert(sender.to_string(), Watch { listener, timer });

        let minutes = duration.as_secs().div_ceil(60);
        let _ = chat.send_message(&messages::watch_started(minutes)).await;
    }

    fn user_network(&self, sender: &str) -> Network {
        self.store
            .get_user_value(sender, NETWORK_KEY)
            .and_then(|v| v.as_str().and_then(Network::from_str))
            .unwrap_or(self.settings.default_network)
    }

    async fn report_failure<C: ChatProvider>(&self, chat: &C, err: &anyhow::Error) {
        tracing::error!("Command failed: {:#}", err);
        let _ = chat.send_notification(&failure_message(err)).await;
    }
}

fn strip_wake_phrase(msg: &str) -> Option<&str> {
    let head = msg.get(..WAKE_PHRASE.len())?;
    let rest = &msg[WAKE_PHRASE.len()..];
    if !head.eq_ignore_ascii_case(WAKE_PHRASE) || rest.starts_with(char::is_alphanumeric) {
        return None;
    }
    Some(rest.trim_start_matches([',', '!', ' ']).trim())
}

/// Turns exhausted retries and feed outages into a retry hint.
fn failure_message(err: &anyhow::Error) -> String {
    if err.downcast_ref::<GatewayError>().is_some() {
        return messages::SERVICE_UNAVAILABLE.to_string();
    }
    if let Some(feed_err) = err.downcast_ref::<SubscriberError>() {
        if feed_err.is_unavailable() || *feed_err == SubscriberError::Closed {
            return messages::FEED_UNAVAILABLE.to_string();
        }
    }
    messages::task_failed(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::subscriber::{ConnectionState, SubscriberConfig};
    use crate::application::user_state::StateStoreConfig;
    use crate::domain::traits::{FeedConnector, FeedTransport};
    use crate::domain::types::TrendingToken;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct FakeChat {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl FakeChat {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn last(&self) -> String {
            self.sent().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatProvider for FakeChat {
        async fn send_message(&self, content: &str) -> Result<String, String> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(content.to_string());
            Ok(format!("$event{}", sent.len()))
        }

        async fn send_notification(&self, content: &str) -> Result<(), String> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn typing(&self, _active: bool) -> Result<(), String> {
            Ok(())
        }

        fn room_id(&self) -> String {
            "!room:example.org".to_string()
        }
    }

    #[derive(Default)]
    struct FakeLlm {
        prompts: Mutex<Vec<(AnalysisMode, String)>>,
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn completion(&self, mode: AnalysisMode, prompt: &str) -> Result<String, String> {
            self.prompts.lock().unwrap().push((mode, prompt.to_string()));
            Ok(format!("llm: {prompt}"))
        }
    }

    #[derive(Default)]
    struct FakeMarket {
        unavailable: bool,
        calls: Mutex<Vec<(Network, String)>>,
    }

    impl FakeMarket {
        fn exhausted() -> anyhow::Error {
            GatewayError::Exhausted {
                endpoint: "/ranking/ether/hotpools".to_string(),
                attempts: 4,
                last_error: "HTTP 429".to_string(),
            }
            .into()
        }
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn trending(&self, network: Network) -> anyhow::Result<Vec<TrendingToken>> {
            self.calls.lock().unwrap().push((network, String::new()));
            if self.unavailable {
                return Err(Self::exhausted());
            }
            Ok(vec![TrendingToken {
                rank: 1,
                name: "Kats".to_string(),
                symbol: "KATS".to_string(),
                address: "0x1234567890abcdef1234".to_string(),
            }])
        }

        async fn token_price(&self, network: Network, address: &str) -> anyhow::Result<f64> {
            self.calls.lock().unwrap().push((network, address.to_string()));
            if self.unavailable {
                return Err(Self::exhausted());
            }
            Ok(2.5)
        }

        async fn token_report(&self, network: Network, address: &str) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push((network, address.to_string()));
            if self.unavailable {
                return Err(Self::exhausted());
            }
            Ok(format!("report for {address}"))
        }
    }

    struct ChannelTransport {
        inbound: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl FeedTransport for ChannelTransport {
        async fn send_text(&mut self, _text: String) -> Result<(), SubscriberError> {
            Ok(())
        }

        async fn next_text(&mut self) -> Option<Result<String, SubscriberError>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            self.inbound.close();
        }
    }

    /// Serves the queued connections, then refuses.
    #[derive(Default)]
    struct ScriptedConnector {
        script: Mutex<VecDeque<mpsc::UnboundedReceiver<String>>>,
    }

    impl ScriptedConnector {
        fn with_connection(&self) -> mpsc::UnboundedSender<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.script.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl FeedConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Box<dyn FeedTransport>, SubscriberError> {
            match self.script.lock().unwrap().pop_front() {
                Some(inbound) => Ok(Box::new(ChannelTransport { inbound })),
                None => Err(SubscriberError::Connect("connection refused".to_string())),
            }
        }
    }

    struct Harness {
        router: CommandRouter,
        store: StateStore,
        llm: Arc<FakeLlm>,
        market: Arc<FakeMarket>,
        feed: EventSubscriber,
        chat: FakeChat,
    }

    fn harness(market: FakeMarket, connector: Arc<ScriptedConnector>) -> Harness {
        let store = StateStore::new(StateStoreConfig::default());
        let llm = Arc::new(FakeLlm::default());
        let market = Arc::new(market);
        let feed = EventSubscriber::new(
            connector,
            SubscriberConfig {
                max_attempts: 1,
                ..SubscriberConfig::default()
            },
        );
        let router = CommandRouter::new(
            store.clone(),
            llm.clone(),
            market.clone(),
            feed.clone(),
            RouterSettings::default(),
        );
        Harness {
            router,
            store,
            llm,
            market,
            feed,
            chat: FakeChat::default(),
        }
    }

    fn new_token_frame(symbol: &str) -> String {
        json!({"type": NEW_TOKEN_EVENT, "data": {"name": "Token", "symbol": symbol, "mint": "M1nt"}})
            .to_string()
    }

    const USER: &str = "@alice:example.org";

    #[test]
    fn test_strip_wake_phrase() {
        assert_eq!(strip_wake_phrase("Hey Kats, what is a rug?"), Some("what is a rug?"));
        assert_eq!(strip_wake_phrase("hey kats"), Some(""));
        assert_eq!(strip_wake_phrase("hey"), None);
        assert_eq!(strip_wake_phrase("hello kats"), None);
        assert_eq!(strip_wake_phrase("hey katsu curry"), None);
    }

    #[test]
    fn test_failure_message_classifies_errors() {
        assert_eq!(failure_message(&FakeMarket::exhausted()), messages::SERVICE_UNAVAILABLE);
        let timeout: anyhow::Error = SubscriberError::Timeout {
            event_type: NEW_TOKEN_EVENT.to_string(),
            waited: Duration::from_secs(10),
        }
        .into();
        assert_eq!(failure_message(&timeout), messages::FEED_UNAVAILABLE);
        assert!(failure_message(&anyhow::anyhow!("bad address")).contains("bad address"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_text_in_price_alert_state_goes_to_llm_and_keeps_data() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.store.set_state(USER, UserStateKind::WaitingPriceAlert);
        h.store
            .set_user_value(USER, "pending_network", json!("base"));

        h.router.route(&h.chat, "alert me at 0.5", USER).await.unwrap();

        assert_eq!(
            h.llm.prompts.lock().unwrap().as_slice(),
            &[(AnalysisMode::Chat, "alert me at 0.5".to_string())]
        );
        assert_eq!(h.chat.last(), "llm: alert me at 0.5");
        assert_eq!(h.store.get_state(USER), None);
        assert_eq!(h.store.get_user_value(USER, "pending_network"), Some(json!("base")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_free_text_is_ignored() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.router.route(&h.chat, "gm", USER).await.unwrap();
        assert!(h.chat.sent().is_empty());
        assert!(h.llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_phrase_bypasses_state() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.store.set_state(USER, UserStateKind::WaitingScanInput);

        h.router.route(&h.chat, "hey kats is SOL up?", USER).await.unwrap();

        assert_eq!(h.chat.last(), "llm: is SOL up?");
        assert_eq!(h.store.get_state(USER), Some(UserStateKind::WaitingScanInput));
        assert!(h.market.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_meme_command_sets_state_then_uses_meme_prompt() {
        let h = harness(FakeMarket::default(), Arc::default());

        h.router.route(&h.chat, ".meme", USER).await.unwrap();
        assert_eq!(h.store.get_state(USER), Some(UserStateKind::WaitingMemeInput));
        assert_eq!(h.chat.last(), messages::MEME_PROMPT);
        assert_eq!(h.store.tracked_messages(USER), vec!["$event1".to_string()]);

        h.router.route(&h.chat, "a frog with a hat", USER).await.unwrap();
        assert_eq!(
            h.llm.prompts.lock().unwrap()[0],
            (AnalysisMode::MemeCapital, "a frog with a hat".to_string())
        );
        assert_eq!(h.store.get_state(USER), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_uses_user_network() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.router.route(&h.chat, ".network base", USER).await.unwrap();
        assert_eq!(h.store.get_user_value(USER, NETWORK_KEY), Some(json!("base")));

        h.router.route(&h.chat, ".scan", USER).await.unwrap();
        h.router.route(&h.chat, "0xabc", USER).await.unwrap();

        assert_eq!(
            h.market.calls.lock().unwrap().as_slice(),
            &[(Network::Base, "0xabc".to_string())]
        );
        assert_eq!(h.chat.last(), "report for 0xabc");
        assert_eq!(h.store.get_state(USER), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_and_cancel_clear_pending_data() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.store.set_state(USER, UserStateKind::WaitingTransferAmount);
        h.store
            .set_user_value(USER, "pending_transfer", json!({"amount": 1}));

        h.router.route(&h.chat, ".menu", USER).await.unwrap();
        assert_eq!(h.store.get_state(USER), Some(UserStateKind::MainMenu));
        assert_eq!(h.store.get_user_value(USER, "pending_transfer"), None);

        h.router.route(&h.chat, ".cancel", USER).await.unwrap();
        assert_eq!(h.store.get_state(USER), None);
        assert_eq!(h.chat.last(), messages::CANCELLED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_requests_become_unavailable_message() {
        let market = FakeMarket {
            unavailable: true,
            ..FakeMarket::default()
        };
        let h = harness(market, Arc::default());

        h.router.route(&h.chat, ".trending solana", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::SERVICE_UNAVAILABLE);
        assert_eq!(h.market.calls.lock().unwrap()[0].0, Network::Solana);

        h.router.route(&h.chat, ".price 0xabc", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_network_makes_no_request() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.router.route(&h.chat, ".trending dogechain", USER).await.unwrap();
        assert!(h.market.calls.lock().unwrap().is_empty());
        assert!(h.chat.last().contains("Unsupported network"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_reports_next_token() {
        let connector = Arc::new(ScriptedConnector::default());
        let feed_tx = connector.with_connection();
        let h = harness(FakeMarket::default(), connector);

        let pump = h.router.route(&h.chat, ".pump", USER);
        let publish = async {
            let mut states = h.feed.state_changes();
            while *states.borrow_and_update() != ConnectionState::Connected {
                states.changed().await.unwrap();
            }
            feed_tx.send(new_token_frame("PEPE")).unwrap();
        };
        let (result, ()) = tokio::join!(pump, publish);
        result.unwrap();

        assert!(h.chat.last().contains("Symbol: PEPE"));
        assert_eq!(h.feed.listener_count(NEW_TOKEN_EVENT), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_reports_feed_outage() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.router.route(&h.chat, ".pump", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::FEED_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_posts_tokens_until_session_ends() {
        let connector = Arc::new(ScriptedConnector::default());
        let feed_tx = connector.with_connection();
        let h = harness(FakeMarket::default(), connector);

        h.router.route(&h.chat, ".watch", USER).await.unwrap();
        assert_eq!(h.store.get_state(USER), Some(UserStateKind::WatchingPumpTokens));
        assert_eq!(h.feed.listener_count(NEW_TOKEN_EVENT), 1);

        h.router.route(&h.chat, ".watch", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::ALREADY_WATCHING);

        feed_tx.send(new_token_frame("WIF")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.chat.sent().iter().any(|m| m.contains("Symbol: WIF")));

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(h.chat.last(), messages::WATCH_ENDED);
        assert_eq!(h.feed.listener_count(NEW_TOKEN_EVENT), 0);
        assert_eq!(h.store.get_state(USER), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwatch_ends_session_early() {
        let h = harness(FakeMarket::default(), Arc::default());

        h.router.route(&h.chat, ".unwatch", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::NOT_WATCHING);

        h.router.route(&h.chat, ".watch", USER).await.unwrap();
        h.router.route(&h.chat, ".unwatch", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::WATCH_ENDED);
        assert_eq!(h.feed.listener_count(NEW_TOKEN_EVENT), 0);

        let sent = h.chat.sent().len();
        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
        assert_eq!(h.chat.sent().len(), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_and_unknown_command() {
        let h = harness(FakeMarket::default(), Arc::default());
        h.router.route(&h.chat, ".status", USER).await.unwrap();
        let status = h.chat.last();
        assert!(status.contains("State: `idle`"));
        assert!(status.contains("Network: ethereum"));
        assert!(status.contains("Token feed: disconnected"));
        assert!(!status.contains("Resets in"));

        h.store.set_state(USER, UserStateKind::WaitingScanInput);
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        h.router.route(&h.chat, ".status", USER).await.unwrap();
        let status = h.chat.last();
        assert!(status.contains("State: `WAITING_SCAN_INPUT`"));
        assert!(status.contains("Resets in: 20 min"));

        h.router.route(&h.chat, ".frobnicate", USER).await.unwrap();
        assert_eq!(h.chat.last(), messages::UNKNOWN_COMMAND);
    }
}
