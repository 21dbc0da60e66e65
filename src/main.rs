//! veilbot - anonymous 1-to-1 chat relay bot for Telegram.

use std::path::Path;
use std::sync::Arc;
use teloxide::Bot;
use teloxide::prelude::Requester;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};
use veilbot::bot::commands::UserCommand;
use veilbot::bot::dispatch;
use veilbot::config::{Config, LogFormat};
use veilbot::relay::Relay;
use veilbot::store::Store;
use veilbot::store::redis::RedisBackend;
use veilbot::sweeper::spawn_sweeper;
use veilbot::transport::telegram::TelegramTransport;

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Returns `None` when no argument was given and the default
/// `veilbot.toml` does not exist (pure-env configuration).
fn resolve_config_path() -> Option<String> {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => {
            let default = "veilbot.toml";
            if !Path::new(default).exists() {
                return None;
            }
            default.to_string()
        }
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => Some(p.to_string_lossy().into_owned()),
        Err(_) => Some(raw_path),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log.format).
    let config = match resolve_config_path() {
        Some(path) => Config::load(&path).map_err(|e| {
            eprintln!("ERROR: Failed to load config from {}: {}", path, e);
            e
        })?,
        None => Config::from_env(),
    };

    // Initialize tracing based on config.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    // Validate configuration.
    if let Err(errors) = veilbot::config::validate(&config) {
        for err in &errors {
            error!(error = %err, "Configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(
        admins = config.bot.admins.len(),
        chat_timeout_secs = config.matching.chat_timeout_secs,
        "Starting veilbot"
    );

    // Connect the session store and register the pairing scripts.
    let store: Store = Arc::new(RedisBackend::connect(&config.store.url).await?);
    info!(url = %config.store.url, "Session store connected");

    let bot = Bot::new(&config.bot.token);
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let relay = Relay::new(config, store, transport);

    // Advertise the public command surface to Telegram clients.
    if let Err(err) = bot.set_my_commands(UserCommand::bot_commands()).await {
        tracing::warn!(error = %err, "Failed to publish command list");
    }

    // Inactivity sweeper.
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let sweeper = spawn_sweeper(relay.clone(), shutdown_tx.subscribe());
    info!("Inactivity sweeper started");

    dispatch::run(relay, bot).await;

    info!("Dispatcher stopped, shutting down");
    let _ = shutdown_tx.send(());
    let _ = sweeper.await;

    Ok(())
}
