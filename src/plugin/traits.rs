use async_trait::async_trait;

use super::hooks::{CommandContext, EventContext, HookRegistry};
use super::PluginError;
use crate::state::SharedState;

/// Core plugin trait. All feature modules implement this.
///
/// Lifecycle: constructed → attach() once → never detached.
pub trait Plugin: Send + Sync {
    /// Stable identifier used in logs and in the status endpoint.
    fn name(&self) -> &'static str;

    /// Register commands, event subscriptions and routes.
    ///
    /// Runs synchronously during startup, before any service exists.
    /// Returning an error aborts startup.
    fn attach(&self, state: &SharedState, hooks: &mut HookRegistry) -> Result<(), PluginError>;
}

/// Handler behind a chat command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command. `Some(text)` is sent back to the channel.
    async fn run(&self, ctx: CommandContext) -> Result<Option<String>, PluginError>;
}

/// Subscriber to a named gateway event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &EventContext) -> Result<(), PluginError>;
}
