#![recursion_limit = "256"]

//! # Main Entry Point
//!
//! Wires the layers together:
//! - Domain: Configuration, Types and Traits
//! - Infrastructure: Matrix, DexTools, PumpPortal feed, LLM
//! - Application: Conversation state, Request gateway, Feed subscriber, Router
//!

mod application;
mod domain;
mod infrastructure;
mod strings;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use matrix_sdk::{
    Client,
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::{MessageType, SyncRoomMessageEvent},
    },
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::application::gateway::RequestGateway;
use crate::application::router::{CommandRouter, RouterSettings};
use crate::application::subscriber::EventSubscriber;
use crate::application::user_state::StateStore;
use crate::domain::config::AppConfig;
use crate::domain::types::Network;
use crate::infrastructure::dextools::DexToolsClient;
use crate::infrastructure::llm::Client as LlmClient;
use crate::infrastructure::matrix::MatrixService;
use crate::infrastructure::pumpportal::WsConnector;
use crate::strings::logs;

/// Matrix bot for token scans, trending pools and the pump.fun launch feed.
#[derive(Parser, Debug)]
#[command(name = "trenchbot", version, about)]
struct Args {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "data/config.yaml")]
    config: PathBuf,

    /// Directory for the session log (overrides `system.data_dir`)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Configuration
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    // 2. Logging Setup
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.system.data_dir));
    let _guard = init_logging(&data_dir)?;
    tracing::info!("{}", logs::STARTING);

    // 3. Application Components
    let store = StateStore::new((&config.conversation).into());
    let sweeper = store.spawn_sweeper();

    let gateway = RequestGateway::new((&config.gateway).into());
    let market = Arc::new(DexToolsClient::new(&config.services.dextools, gateway)?);
    let llm = Arc::new(build_llm(&config)?);

    let feed = EventSubscriber::new(
        Arc::new(WsConnector::new(config.services.pumpportal.url.clone())),
        (&config.feed).into(),
    );
    feed.connect();

    let default_network = Network::from_str(&config.system.default_network)
        .ok_or_else(|| anyhow!("Unsupported default network: {}", config.system.default_network))?;
    let router = Arc::new(CommandRouter::new(
        store,
        llm,
        market,
        feed.clone(),
        RouterSettings {
            watch_duration: Duration::from_secs(config.feed.watch_minutes * 60),
            default_network,
        },
    ));

    // 4. Matrix Setup
    let matrix = &config.services.matrix;
    let client = Client::builder()
        .homeserver_url(&matrix.homeserver)
        .build()
        .await?;

    client
        .matrix_auth()
        .login_username(&matrix.username, &matrix.password)
        .send()
        .await?;
    tracing::info!("{}", logs::logged_in(&matrix.username));

    if let Some(name) = &matrix.display_name {
        if let Err(e) = client.account().set_display_name(Some(name.as_str())).await {
            tracing::warn!("{}", logs::set_display_name_fail(&e.to_string()));
        }
    }

    // 5. Event Handlers
    let start_time = SystemTime::now();
    let loop_router = router.clone();
    client.add_event_handler(move |ev: SyncRoomMessageEvent, room: Room| {
        let router = loop_router.clone();
        async move {
            let Some(original_msg) = ev.as_original() else {
                return;
            };

            // Ignore history replayed by the initial sync
            let event_time = UNIX_EPOCH + Duration::from_millis(ev.origin_server_ts().get().into());
            if event_time < start_time {
                return;
            }

            let MessageType::Text(text_content) = &original_msg.content.msgtype else {
                return;
            };
            if original_msg.sender == room.own_user_id() {
                return;
            }
            tracing::debug!("Received message from {}: {}", original_msg.sender, text_content.body);

            let chat = MatrixService::new(room);
            if let Err(e) = router
                .route(&chat, &text_content.body, original_msg.sender.as_str())
                .await
            {
                tracing::error!("{}", logs::route_fail(&e.to_string()));
            }
        }
    });

    client.add_event_handler(|ev: StrippedRoomMemberEvent, room: Room| async move {
        if ev.content.membership == MembershipState::Invite {
            tracing::info!("{}", logs::invite_received(room.room_id().as_str()));
            if let Err(e) = room.join().await {
                tracing::warn!("{}", logs::join_invite_fail(&e.to_string()));
            }
        }
    });

    // 6. Run until the sync loop dies or Ctrl-C
    tracing::info!("{}", logs::SYNC_LOOP_START);
    let sync_client = client.clone();
    let sync_handle = tokio::spawn(async move { sync_client.sync(SyncSettings::default()).await });

    tokio::select! {
        res = sync_handle => match res {
            Ok(Err(e)) => tracing::error!("{}", logs::sync_loop_fail(&e.to_string())),
            Err(e) => tracing::error!("{}", logs::sync_loop_fail(&e.to_string())),
            Ok(Ok(())) => {}
        },
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("{}", logs::shutdown_fail(&e.to_string()));
            }
            tracing::info!("{}", logs::SHUTDOWN);
        }
    }

    feed.disconnect();
    sweeper.abort();
    Ok(())
}

/// File layer (`session.log`, recreated every run) plus stdout.
fn init_logging(data_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    if !data_dir.exists() {
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    }

    // Clear previous session log
    let log_path = data_dir.join("session.log");
    if log_path.exists() {
        let _ = fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(data_dir, "session.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,matrix_sdk=warn,matrix_sdk_base=warn,matrix_sdk_crypto=error,ruma=warn,hyper=warn,tungstenite=warn",
        )
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

/// Uses `system.default_agent`, else the alphabetically first configured agent.
fn build_llm(config: &AppConfig) -> Result<LlmClient> {
    let name = match &config.system.default_agent {
        Some(name) => name.clone(),
        None => config
            .agents
            .keys()
            .min()
            .cloned()
            .ok_or_else(|| anyhow!("No LLM agents configured"))?,
    };
    let agent = config
        .agents
        .get(&name)
        .ok_or_else(|| anyhow!("Agent '{}' not found in config", name))?;
    let client = LlmClient::new(&name, agent)?;
    tracing::info!("Using LLM agent '{}'", client.agent_name());
    Ok(client)
}
