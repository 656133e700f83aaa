//! `/namehistory <user>` and the nickname-change recorder behind it.

use std::fmt::Write;

use anyhow::Result;
use chrono::DateTime;
use serenity::all::{
    ChannelId, CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    GuildMemberUpdateEvent, Member, ResolvedOption, ResolvedValue,
};
use tracing::{debug, error, info, warn};

use juicebot_persist::{now_ts, NameChange, NameHistoryEntry, NameStore};

use super::{respond, GUILD_ONLY};
use crate::config::NameHistoryConfig;

const NICK_WIDTH: usize = 29;
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub fn register() -> CreateCommand {
    CreateCommand::new("namehistory")
        .description("Gets the nickname history of a user")
        .add_option(CreateCommandOption::new(CommandOptionType::User, "user", "user to lookup").required(true))
}

pub async fn run(cfg: &NameHistoryConfig, store: &dyn NameStore, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let Some(guild) = command.guild_id else {
        return respond(ctx, command, GUILD_ONLY).await;
    };
    let guild_id = guild.to_string();
    if !cfg.guilds.contains(&guild_id) {
        return respond(ctx, command, "Name history is not enabled on this server").await;
    }
    let user = command.data.options().into_iter().find_map(|o| match o {
        ResolvedOption { name: "user", value: ResolvedValue::User(u, _), .. } => Some(u.id),
        _ => None,
    });
    let Some(user) = user else {
        return respond(ctx, command, "Please specify a user").await;
    };
    let content = match store.history(&guild_id, &user.to_string()) {
        Ok(rows) if rows.is_empty() => "No name history found for this user".to_string(),
        Ok(rows) => render(&rows),
        Err(e) => {
            error!(error = ?e, guild = %guild_id, user = %user, "failed to read name history");
            "Failed to retrieve name history".to_string()
        }
    };
    respond(ctx, command, content).await
}

/// Fixed-width table inside a code block, newest change first.
pub fn render(rows: &[NameHistoryEntry]) -> String {
    let mut out = String::from("```\nName History\n");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{:<30}| Changed At", "Nickname");
    let _ = writeln!(out, "{}", RULE);
    for row in rows {
        let nick = if row.new_display_name.is_empty() {
            "(none)".to_string()
        } else {
            row.new_display_name.chars().take(NICK_WIDTH).collect()
        };
        let _ = writeln!(out, "{:<30}| {}", nick, format_ts(row.changed_at));
    }
    out.push_str("```");
    out
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0).map(|t| t.format("%b %d, %Y %H:%M").to_string()).unwrap_or_else(|| ts.to_string())
}

/// Whether a member update is a nickname change worth recording. Without the
/// cached previous state every update is recorded.
pub fn nick_changed(before: Option<Option<&str>>, after: Option<&str>) -> bool {
    match before {
        Some(before) => before != after,
        None => true,
    }
}

pub async fn on_member_update(
    cfg: &NameHistoryConfig,
    store: &dyn NameStore,
    ctx: &Context,
    old: Option<&Member>,
    event: &GuildMemberUpdateEvent,
) {
    let guild_id = event.guild_id.to_string();
    debug!(user = %event.user.id, guild = %guild_id, nick = ?event.nick, "member update");
    if !cfg.guilds.contains(&guild_id) {
        return;
    }
    if !nick_changed(old.map(|m| m.nick.as_deref()), event.nick.as_deref()) {
        return;
    }
    let change = NameChange {
        guild_id: guild_id.clone(),
        user_id: event.user.id.to_string(),
        new_display_name: event.nick.clone().unwrap_or_default(),
    };
    if let Err(e) = store.add_name(&change, now_ts()) {
        error!(error = ?e, guild = %guild_id, user = %event.user.id, "failed to record name change");
        return;
    }
    info!(guild = %guild_id, user = %event.user.id, nick = %change.new_display_name, "recorded name change");

    if let Some(channel) = cfg.announce_channel {
        let text = format!("<@{}> has a new name!", event.user.id);
        if let Err(e) = ChannelId::new(channel).say(&ctx.http, text).await {
            warn!(error = %e, channel, "failed to announce name change");
        }
    }
}
