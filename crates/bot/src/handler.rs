//! Gateway event dispatch.

use std::sync::Arc;
use std::time::Duration;

use serenity::all::{
    Context, CreateAllowedMentions, CreateMessage, EventHandler, GuildId, GuildMemberUpdateEvent, Interaction, Member,
    Message, Ready,
};
use serenity::async_trait;
use tracing::{error, info, warn};

use juicebot_core::{GameServers, WorkloadSource};
use juicebot_persist::NameStore;

use crate::callout;
use crate::commands::{self, dog, dog::DogTargets, namehistory, ping, servers};
use crate::config::Config;

pub struct Handler<S> {
    pub config: Config,
    pub servers: GameServers<S>,
    pub names: Arc<dyn NameStore>,
    pub dogs: DogTargets,
    /// Register commands in this guild only; global registration when `None`.
    pub command_guild: Option<GuildId>,
}

impl<S> Handler<S> {
    pub fn new(config: Config, servers: GameServers<S>, names: Arc<dyn NameStore>, command_guild: Option<GuildId>) -> Self {
        Self { config, servers, names, dogs: DogTargets::default(), command_guild }
    }

    fn timeout(&self) -> Duration { Duration::from_secs(self.config.servers.timeout_secs.max(1)) }

    async fn callout(&self, ctx: &Context, msg: &Message) {
        let Some(guild) = msg.guild_id else { return };
        let line = {
            let mut rng = rand::rng();
            callout::pick(&self.config.callout, &guild.to_string(), &mut rng).map(str::to_owned)
        };
        let Some(line) = line else { return };
        let reply = CreateMessage::new().content(line).reference_message(msg).allowed_mentions(CreateAllowedMentions::new());
        if let Err(e) = msg.channel_id.send_message(&ctx.http, reply).await {
            warn!(error = %e, channel = %msg.channel_id, "failed to send callout");
        }
    }
}

#[async_trait]
impl<S: WorkloadSource + 'static> EventHandler for Handler<S> {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "connected to discord");
        commands::register(&ctx.http, self.command_guild).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else { return };
        let name = command.data.name.as_str();
        info!(command = %name, user = %command.user.id, guild = ?command.guild_id, "command received");
        let res = match name {
            "ping" => ping::run(&ctx, &command).await,
            "dog" => dog::run(&self.dogs, &ctx, &command).await,
            "servers" => servers::run(&self.servers, self.timeout(), &ctx, &command).await,
            "namehistory" => namehistory::run(&self.config.name_history, self.names.as_ref(), &ctx, &command).await,
            other => {
                warn!(command = %other, "unknown command");
                commands::respond(&ctx, &command, "Unknown command").await
            }
        };
        if let Err(e) = res {
            error!(error = ?e, command = %name, "command failed");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        dog::on_message(&self.dogs, &self.config.dog.emote, &ctx, &msg).await;
        self.callout(&ctx, &msg).await;
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        old: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        namehistory::on_member_update(&self.config.name_history, self.names.as_ref(), &ctx, old.as_ref(), &event).await;
    }
}
