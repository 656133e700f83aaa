//! `/servers list|start|stop`: guild-scoped game server control.

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use metrics::{counter, histogram};
use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption, EditInteractionResponse,
    ResolvedOption, ResolvedValue,
};
use tracing::{error, warn};

use juicebot_core::{GameServers, Requester, TargetState, WorkloadSource};

use super::{respond, GUILD_ONLY};
use crate::render;

pub fn register() -> CreateCommand {
    let server_arg = |what: &str| {
        CreateCommandOption::new(CommandOptionType::String, "server", format!("Server ID to {} (namespace/name)", what))
            .required(true)
    };
    CreateCommand::new("servers")
        .description("Manage game servers")
        .add_option(CreateCommandOption::new(CommandOptionType::SubCommand, "list", "List all game servers"))
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "start", "Start a game server")
                .add_sub_option(server_arg("start")),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "stop", "Stop a game server")
                .add_sub_option(server_arg("stop")),
        )
}

/// What the user asked for, decoded from the resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    List,
    Toggle(TargetState, Option<&'a str>),
}

pub fn action<'a>(sub: &str, args: &[ResolvedOption<'a>]) -> Option<Action<'a>> {
    let server = args.iter().find_map(|o| match o {
        ResolvedOption { name: "server", value: ResolvedValue::String(s), .. } => Some(*s),
        _ => None,
    });
    match sub {
        "list" => Some(Action::List),
        "start" => Some(Action::Toggle(TargetState::Running, server)),
        "stop" => Some(Action::Toggle(TargetState::Stopped, server)),
        _ => None,
    }
}

pub async fn run<S: WorkloadSource>(
    servers: &GameServers<S>,
    timeout: Duration,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let Some(guild) = command.guild_id else {
        return respond(ctx, command, GUILD_ONLY).await;
    };
    let options = command.data.options();
    let decoded = match options.first() {
        Some(ResolvedOption { name, value: ResolvedValue::SubCommand(args), .. }) => action(name, args),
        _ => None,
    };
    let Some(decoded) = decoded else {
        return respond(ctx, command, "Please specify a subcommand: list, start, or stop").await;
    };
    let who = Requester::new(guild.to_string(), command.user.id.to_string());

    let content = match decoded {
        Action::Toggle(target, None) => {
            let verb = if target == TargetState::Running { "start" } else { "stop" };
            return respond(ctx, command, format!("Please specify a server ID to {} (format: namespace/name)", verb)).await;
        }
        Action::List => {
            command.defer(&ctx.http).await.context("deferring servers list")?;
            list(servers, timeout, &who).await
        }
        Action::Toggle(target, Some(raw)) => {
            command.defer(&ctx.http).await.context("deferring servers toggle")?;
            toggle(servers, timeout, &who, raw, target).await
        }
    };
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await
        .context("editing servers response")?;
    Ok(())
}

async fn list<S: WorkloadSource>(servers: &GameServers<S>, timeout: Duration, who: &Requester) -> String {
    let started = Instant::now();
    let res = tokio::time::timeout(timeout, servers.list(&who.guild_id)).await;
    histogram!("servers_list_ms", started.elapsed().as_secs_f64() * 1000.0);
    match res {
        Ok(Ok(list)) => {
            counter!("servers_list_total", 1u64, "result" => "ok");
            render::list(&list, &who.guild_id)
        }
        Ok(Err(e)) => {
            counter!("servers_list_total", 1u64, "result" => "error");
            error!(error = %e, guild = %who.guild_id, "listing game servers failed");
            render::error(&e)
        }
        Err(_) => {
            counter!("servers_list_total", 1u64, "result" => "timeout");
            warn!(guild = %who.guild_id, timeout_secs = timeout.as_secs(), "listing game servers timed out");
            render::UNAVAILABLE.to_string()
        }
    }
}

async fn toggle<S: WorkloadSource>(
    servers: &GameServers<S>,
    timeout: Duration,
    who: &Requester,
    raw: &str,
    target: TargetState,
) -> String {
    match tokio::time::timeout(timeout, servers.toggle(raw, who, target)).await {
        Ok(Ok(res)) => {
            counter!("servers_toggle_total", 1u64, "outcome" => render::outcome_label(res.outcome));
            render::toggle(&res)
        }
        Ok(Err(e)) => {
            counter!("servers_toggle_total", 1u64, "outcome" => "error");
            error!(error = %e, guild = %who.guild_id, user = %who.user_id, server = %raw, ?target, "toggling game server failed");
            render::error(&e)
        }
        Err(_) => {
            counter!("servers_toggle_total", 1u64, "outcome" => "timeout");
            warn!(guild = %who.guild_id, server = %raw, timeout_secs = timeout.as_secs(), "toggling game server timed out");
            render::UNAVAILABLE.to_string()
        }
    }
}
