use anyhow::Result;
use serenity::all::{CommandInteraction, Context, CreateCommand};

use super::respond;

pub fn register() -> CreateCommand { CreateCommand::new("ping").description("pong") }

pub async fn run(ctx: &Context, command: &CommandInteraction) -> Result<()> { respond(ctx, command, "pong!").await }
