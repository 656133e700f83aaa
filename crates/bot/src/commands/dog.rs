//! `/dog [user]`: react to every message from one user per guild.

use std::collections::HashMap;

use anyhow::Result;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption, GuildId, Message, ReactionType,
    ResolvedOption, ResolvedValue, UserId,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{respond, GUILD_ONLY};

/// Which user is being dogged in which guild.
#[derive(Default)]
pub struct DogTargets {
    inner: RwLock<HashMap<GuildId, UserId>>,
}

impl DogTargets {
    pub async fn set(&self, guild: GuildId, user: Option<UserId>) {
        let mut map = self.inner.write().await;
        match user {
            Some(u) => {
                map.insert(guild, u);
            }
            None => {
                map.remove(&guild);
            }
        }
    }

    pub async fn is_target(&self, guild: GuildId, user: UserId) -> bool {
        self.inner.read().await.get(&guild) == Some(&user)
    }
}

pub fn register() -> CreateCommand {
    CreateCommand::new("dog")
        .description("Dog a user")
        .add_option(CreateCommandOption::new(CommandOptionType::User, "user", "User to remind").required(false))
}

pub async fn run(targets: &DogTargets, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let Some(guild) = command.guild_id else {
        return respond(ctx, command, GUILD_ONLY).await;
    };
    let user = command.data.options().into_iter().find_map(|o| match o {
        ResolvedOption { name: "user", value: ResolvedValue::User(u, _), .. } => Some(u.id),
        _ => None,
    });
    targets.set(guild, user).await;
    info!(guild = %guild, user = ?user, by = %command.user.id, "dog target changed");
    match user {
        Some(u) => respond(ctx, command, format!("Now Dogging: <@{}>", u)).await,
        None => respond(ctx, command, "Dogging Disabled").await,
    }
}

/// React to `msg` when its author is the guild's dog target.
pub async fn on_message(targets: &DogTargets, emote: &str, ctx: &Context, msg: &Message) {
    let Some(guild) = msg.guild_id else { return };
    if !targets.is_target(guild, msg.author.id).await {
        return;
    }
    let reaction = match ReactionType::try_from(emote) {
        Ok(r) => r,
        Err(e) => {
            warn!(emote = %emote, error = %e, "invalid dog emote");
            return;
        }
    };
    if let Err(e) = msg.react(&ctx.http, reaction).await {
        warn!(error = %e, channel = %msg.channel_id, "failed to add dog reaction");
    }
}
