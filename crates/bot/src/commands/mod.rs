//! Slash commands: registration and shared response helpers.

pub mod dog;
pub mod namehistory;
pub mod ping;
pub mod servers;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, CreateInteractionResponse, CreateInteractionResponseMessage,
    GuildId, Http,
};
use tracing::{error, info};

pub const GUILD_ONLY: &str = "This command only works inside a server.";

pub fn all() -> Vec<CreateCommand> {
    vec![ping::register(), dog::register(), servers::register(), namehistory::register()]
}

/// Register every command in `guild`, or globally when `None`.
pub async fn register(http: &Arc<Http>, guild: Option<GuildId>) {
    let commands = all();
    let count = commands.len();
    let res = match guild {
        Some(g) => g.set_commands(http, commands).await,
        None => Command::set_global_commands(http, commands).await,
    };
    match res {
        Ok(cmds) => {
            for c in &cmds {
                info!(command = %c.name, guild = ?guild, "registered command");
            }
        }
        Err(e) => error!(error = %e, count, guild = ?guild, "failed to register commands"),
    }
}

/// Remove everything registered by [`register`].
pub async fn unregister(http: &Arc<Http>, guild: Option<GuildId>) -> Result<()> {
    match guild {
        Some(g) => g.set_commands(http, Vec::new()).await.map(|_| ()),
        None => Command::set_global_commands(http, Vec::new()).await.map(|_| ()),
    }
    .context("removing commands")?;
    info!(guild = ?guild, "removed commands");
    Ok(())
}

pub async fn respond(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    let data = CreateInteractionResponseMessage::new().content(content);
    command.create_response(&ctx.http, CreateInteractionResponse::Message(data)).await.context("responding to command")
}
