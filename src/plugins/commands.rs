//! Core chat commands.

use async_trait::async_trait;

use crate::plugin::{CommandContext, CommandHandler, HookRegistry, Plugin, PluginError};
use crate::state::SharedState;

pub struct CommandsPlugin;

impl Plugin for CommandsPlugin {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn attach(&self, _state: &SharedState, hooks: &mut HookRegistry) -> Result<(), PluginError> {
        hooks.add_command("ping", "Check that the bot is alive", Ping)?;
        hooks.add_command("help", "List available commands", Help)?;
        Ok(())
    }
}

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn run(&self, _ctx: CommandContext) -> Result<Option<String>, PluginError> {
        Ok(Some("pong".to_string()))
    }
}

struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn run(&self, ctx: CommandContext) -> Result<Option<String>, PluginError> {
        let prefix = &ctx.state.config().bot.command_prefix;

        // `-help <name>` describes a single command
        if let Some(name) = ctx.args.first() {
            let reply = match ctx.hooks.command(name) {
                Some(cmd) => format!("`{prefix}{}`: {}", cmd.name, cmd.description),
                None => format!("Unknown command `{name}`"),
            };
            return Ok(Some(reply));
        }

        let lines: Vec<String> = ctx
            .hooks
            .commands()
            .map(|cmd| format!("`{prefix}{}`: {}", cmd.name, cmd.description))
            .collect();
        Ok(Some(lines.join("\n")))
    }
}
