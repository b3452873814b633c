//! Guild membership notifications.
//!
//! Keeps the store's connected-guild set in step with `GUILD_CREATE` and
//! `GUILD_DELETE` dispatches and logs member joins.

use async_trait::async_trait;
use serde_json::Value;

use super::str_field;
use crate::plugin::{EventContext, EventHandler, HookRegistry, Plugin, PluginError};
use crate::state::SharedState;
use crate::store::keys;

pub struct NotificationsPlugin;

impl Plugin for NotificationsPlugin {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn attach(&self, _state: &SharedState, hooks: &mut HookRegistry) -> Result<(), PluginError> {
        hooks.subscribe("GUILD_CREATE", GuildJoined);
        hooks.subscribe("GUILD_DELETE", GuildLeft);
        hooks.subscribe("GUILD_MEMBER_ADD", MemberJoined);
        Ok(())
    }
}

struct GuildJoined;

#[async_trait]
impl EventHandler for GuildJoined {
    async fn handle(&self, ctx: &EventContext) -> Result<(), PluginError> {
        let data = &ctx.event.data;
        let guild_id = str_field(data, "id")?;
        let name = data.get("name").and_then(Value::as_str).unwrap_or_default();

        let mut conn = ctx.state.pool().get().await?;
        let result = conn.sadd(keys::CONNECTED_GUILDS, &[guild_id]).await;
        let released = conn.release(result.is_err()).await;
        let added = result?;
        released?;

        if added > 0 {
            tracing::info!(guild_id, name, "Joined guild");
        } else {
            tracing::debug!(guild_id, name, "Guild available");
        }
        Ok(())
    }
}

struct GuildLeft;

#[async_trait]
impl EventHandler for GuildLeft {
    async fn handle(&self, ctx: &EventContext) -> Result<(), PluginError> {
        let data = &ctx.event.data;
        let guild_id = str_field(data, "id")?;

        // Outages are reported as unavailable; the bot is still a member
        if data.get("unavailable").and_then(Value::as_bool).unwrap_or(false) {
            tracing::warn!(guild_id, "Guild became unavailable");
            return Ok(());
        }

        let mut conn = ctx.state.pool().get().await?;
        let result = conn.srem(keys::CONNECTED_GUILDS, &[guild_id]).await;
        let released = conn.release(result.is_err()).await;
        result?;
        released?;

        tracing::info!(guild_id, "Left guild");
        Ok(())
    }
}

struct MemberJoined;

#[async_trait]
impl EventHandler for MemberJoined {
    async fn handle(&self, ctx: &EventContext) -> Result<(), PluginError> {
        let data = &ctx.event.data;
        let guild_id = str_field(data, "guild_id")?;
        let user = data.get("user").unwrap_or(&Value::Null);
        let user_id = str_field(user, "id")?;
        let username = user.get("username").and_then(Value::as_str).unwrap_or_default();

        tracing::info!(guild_id, user_id, username, "Member joined");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Event, Hooks};
    use crate::state::testing::offline_state;
    use serde_json::json;

    async fn attached() -> (SharedState, Hooks) {
        let state = offline_state().await;
        let mut registry = HookRegistry::new();
        NotificationsPlugin.attach(&state, &mut registry).unwrap();
        (state, registry.freeze())
    }

    fn event(name: &str, data: Value) -> Event {
        Event {
            name: name.into(),
            data,
        }
    }

    #[tokio::test]
    async fn test_member_join_is_logged_without_store() {
        let (state, hooks) = attached().await;
        let data = json!({ "guild_id": "1", "user": { "id": "2", "username": "new" } });
        assert_eq!(hooks.dispatch_event(&state, event("GUILD_MEMBER_ADD", data)).await, 1);
        assert_eq!(state.pool().stats().acquired, 0);
    }

    #[tokio::test]
    async fn test_malformed_payloads_fail() {
        let (state, hooks) = attached().await;
        assert_eq!(
            hooks.dispatch_event(&state, event("GUILD_MEMBER_ADD", json!({ "guild_id": "1" }))).await,
            0
        );
        assert_eq!(hooks.dispatch_event(&state, event("GUILD_CREATE", json!({}))).await, 0);
    }

    #[tokio::test]
    async fn test_unavailable_guild_is_kept() {
        let (state, hooks) = attached().await;
        let data = json!({ "id": "5", "unavailable": true });
        assert_eq!(hooks.dispatch_event(&state, event("GUILD_DELETE", data)).await, 1);
        assert_eq!(state.pool().stats().acquired, 0);
    }

    #[tokio::test]
    async fn test_guild_create_needs_store() {
        let (state, hooks) = attached().await;
        let data = json!({ "id": "5", "name": "guild" });
        assert_eq!(hooks.dispatch_event(&state, event("GUILD_CREATE", data)).await, 0);
        assert_eq!(state.pool().stats().dial_failures, 1);
    }
}
