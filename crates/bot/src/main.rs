//! juicebot: Discord bot for game server control, nickname history and banter.
#![forbid(unsafe_code)]

mod callout;
mod commands;
mod config;
mod handler;
mod render;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser};
use serenity::all::{GatewayIntents, GuildId};
use serenity::Client;
use tracing::{info, warn};

use juicebot_core::GameServers;
use juicebot_kubehub::KubeSource;
use juicebot_persist::{NameStore, SqliteStore};

use crate::config::Config;
use crate::handler::Handler;

#[derive(Parser, Debug)]
#[command(name = "juicebot", version, about = "Discord bot for the juicecloud game servers")]
struct Cli {
    /// Bot access token
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: String,
    /// YAML config file
    #[arg(long, env = "CONFIG", default_value = "./config.yaml")]
    config: PathBuf,
    /// Test guild; commands are registered globally when omitted
    #[arg(long, env = "GUILD_ID")]
    guild: Option<u64>,
    /// Remove registered commands on shutdown
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    rmcmd: bool,
    /// SQLite file for name history (default ~/.juicebot/juicebot.db)
    #[arg(long, env = "JUICEBOT_DB_PATH")]
    db: Option<String>,
}

fn init_tracing() {
    let env = std::env::var("JUICEBOT_LOG").unwrap_or_else(|_| "info,serenity=warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("JUICEBOT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid JUICEBOT_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    if config.debug {
        info!(config = ?config, "loaded config");
    }

    let names: Arc<dyn NameStore> = Arc::new(match &cli.db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    });
    let source = KubeSource::connect().await?;
    let servers = GameServers::new(source, config.servers.namespace.clone());
    info!(namespace = %servers.namespace(), "managing game servers");

    let command_guild = cli.guild.map(GuildId::new);
    let handler = Handler::new(config, servers, names, command_guild);
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&cli.token, intents).event_handler(handler).await.context("creating discord client")?;

    let shards = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shards.shutdown_all().await;
        }
    });

    info!("starting discord client");
    client.start().await.context("running discord client")?;

    if cli.rmcmd {
        commands::unregister(&client.http, command_guild).await?;
    }
    info!("bye");
    Ok(())
}
