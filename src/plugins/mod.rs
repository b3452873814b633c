//! Built-in plugins.
//!
//! Registration order is attachment order: `commands`, `serverstats`,
//! `notifications`.

pub mod commands;
pub mod notifications;
pub mod serverstats;

use serde_json::Value;

use crate::plugin::{PluginError, PluginRegistry};

pub use commands::CommandsPlugin;
pub use notifications::NotificationsPlugin;
pub use serverstats::ServerStatsPlugin;

/// The registry every process starts with.
pub fn builtin() -> PluginRegistry {
    PluginRegistry::new()
        .with(CommandsPlugin)
        .with(ServerStatsPlugin::new())
        .with(NotificationsPlugin)
}

/// Read a string field from an event payload.
pub(crate) fn str_field<'a>(data: &'a Value, key: &str) -> Result<&'a str, PluginError> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::runtime(format!("event payload missing '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::offline_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_builtin_attaches_in_order() {
        let registry = builtin();
        assert_eq!(registry.names(), vec!["commands", "serverstats", "notifications"]);

        let hooks = registry.attach_all(&offline_state().await).unwrap();
        let names: Vec<_> = hooks.commands().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["help", "ping", "stats"]);
        assert_eq!(hooks.subscriber_count("MESSAGE_CREATE"), 1);
        assert_eq!(hooks.subscriber_count("GUILD_CREATE"), 1);
        assert_eq!(hooks.subscriber_count("GUILD_DELETE"), 1);
        assert_eq!(hooks.subscriber_count("GUILD_MEMBER_ADD"), 1);
    }

    #[test]
    fn test_str_field() {
        let data = json!({ "id": "42", "n": 1 });
        assert_eq!(str_field(&data, "id").unwrap(), "42");
        assert!(str_field(&data, "n").is_err());
        assert!(str_field(&data, "missing").is_err());
    }
}
