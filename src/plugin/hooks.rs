//! Registration surface shared by all plugins.
//!
//! # Data Flow
//! ```text
//! PluginRegistry::attach_all
//!     → HookRegistry (mutable; commands, event subscriptions, routes)
//!     → freeze()
//!     → Hooks (immutable, Arc-shared with the client loop and web services)
//! ```
//!
//! # Design Decisions
//! - Registration is only possible before services start; afterwards the
//!   tables are read-only and need no locking
//! - Duplicate command names and route paths are attach errors, not panics

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::routing::MethodRouter;
use axum::Router;
use serde_json::Value;

use super::traits::{CommandHandler, EventHandler};
use super::PluginError;
use crate::session::MessageCreate;
use crate::state::SharedState;

/// Paths owned by the web service itself.
pub const RESERVED_ROUTES: &[&str] = &["/healthz", "/api/status"];

/// A registered chat command.
pub struct Command {
    pub name: String,
    pub description: String,
    pub plugin: &'static str,
    handler: Arc<dyn CommandHandler>,
}

/// Everything a command handler gets to see.
pub struct CommandContext {
    pub state: SharedState,
    pub hooks: Arc<Hooks>,
    pub message: MessageCreate,
    pub args: Vec<String>,
}

/// A gateway dispatch, by name.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

/// Everything an event handler gets to see.
pub struct EventContext {
    pub state: SharedState,
    pub event: Event,
}

struct Subscription {
    plugin: &'static str,
    handler: Arc<dyn EventHandler>,
}

/// Mutable registration tables, handed to each plugin's `attach`.
pub struct HookRegistry {
    current: &'static str,
    plugins: Vec<&'static str>,
    commands: BTreeMap<String, Command>,
    events: HashMap<String, Vec<Subscription>>,
    routes: Vec<String>,
    router: Router,
}

impl HookRegistry {
    pub(crate) fn new() -> Self {
        Self {
            current: "",
            plugins: Vec::new(),
            commands: BTreeMap::new(),
            events: HashMap::new(),
            routes: RESERVED_ROUTES.iter().map(|r| r.to_string()).collect(),
            router: Router::new(),
        }
    }

    /// Attribute subsequent registrations to `plugin`.
    pub(crate) fn begin(&mut self, plugin: &'static str) {
        self.current = plugin;
        self.plugins.push(plugin);
    }

    /// Register a command under a unique, case-insensitive name.
    pub fn add_command<H>(&mut self, name: &str, description: &str, handler: H) -> Result<(), PluginError>
    where
        H: CommandHandler + 'static,
    {
        let name = name.to_lowercase();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(PluginError::InvalidRegistration(format!("bad command name '{name}'")));
        }
        if self.commands.contains_key(&name) {
            return Err(PluginError::DuplicateCommand(name));
        }

        tracing::debug!(plugin = self.current, command = %name, "Command registered");
        self.commands.insert(
            name.clone(),
            Command {
                name,
                description: description.to_string(),
                plugin: self.current,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Subscribe to a gateway event such as `MESSAGE_CREATE`.
    pub fn subscribe<H>(&mut self, event: &str, handler: H)
    where
        H: EventHandler + 'static,
    {
        tracing::debug!(plugin = self.current, event, "Event subscription registered");
        self.events
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                plugin: self.current,
                handler: Arc::new(handler),
            });
    }

    /// Mount a route on the web service.
    pub fn mount(&mut self, path: &str, route: MethodRouter) -> Result<(), PluginError> {
        if !path.starts_with('/') {
            return Err(PluginError::InvalidRegistration(format!("route '{path}' must start with '/'")));
        }
        if self.routes.iter().any(|r| r == path) {
            return Err(PluginError::DuplicateRoute(path.to_string()));
        }

        tracing::debug!(plugin = self.current, path, "Route mounted");
        self.routes.push(path.to_string());
        self.router = std::mem::take(&mut self.router).route(path, route);
        Ok(())
    }

    pub(crate) fn freeze(self) -> Hooks {
        Hooks {
            plugins: self.plugins,
            commands: self.commands,
            events: self.events,
            router: self.router,
        }
    }
}

/// Frozen registration tables.
pub struct Hooks {
    plugins: Vec<&'static str>,
    commands: BTreeMap<String, Command>,
    events: HashMap<String, Vec<Subscription>>,
    router: Router,
}

impl Hooks {
    /// Plugins in attachment order.
    pub fn plugins(&self) -> &[&'static str] {
        &self.plugins
    }

    /// Commands sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, Vec::len)
    }

    /// Routes mounted by plugins.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run every subscriber of `event`, in registration order.
    ///
    /// Handler failures are logged and do not stop later handlers.
    /// Returns how many handlers succeeded.
    pub async fn dispatch_event(&self, state: &SharedState, event: Event) -> usize {
        let Some(subscribers) = self.events.get(&event.name) else {
            return 0;
        };

        let ctx = EventContext {
            state: state.clone(),
            event,
        };
        let mut handled = 0;
        for sub in subscribers {
            match sub.handler.handle(&ctx).await {
                Ok(()) => handled += 1,
                Err(e) => tracing::error!(
                    plugin = sub.plugin,
                    event = %ctx.event.name,
                    error = %e,
                    "Event handler failed"
                ),
            }
        }
        handled
    }

    /// Split a prefixed message into a known command and its arguments.
    pub fn parse_command(&self, prefix: &str, content: &str) -> Option<(&Command, Vec<String>)> {
        let body = content.strip_prefix(prefix)?;
        let mut words = body.split_whitespace();
        let command = self.command(words.next()?)?;
        Some((command, words.map(str::to_string).collect()))
    }

    /// Route a chat message to its command, if it names one.
    ///
    /// Messages from bots are ignored. Returns the reply to send, if any.
    pub async fn handle_message(
        self: &Arc<Self>,
        state: &SharedState,
        message: MessageCreate,
    ) -> Result<Option<String>, PluginError> {
        if message.author.bot {
            return Ok(None);
        }
        let prefix = &state.config().bot.command_prefix;
        let Some((command, args)) = self.parse_command(prefix, &message.content) else {
            return Ok(None);
        };

        tracing::debug!(command = %command.name, plugin = command.plugin, "Running command");
        let handler = command.handler.clone();
        handler
            .run(CommandContext {
                state: state.clone(),
                hooks: self.clone(),
                message,
                args,
            })
            .await
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("plugins", &self.plugins)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::Author;
    use crate::state::testing::offline_state;
    use async_trait::async_trait;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn run(&self, ctx: CommandContext) -> Result<Option<String>, PluginError> {
            Ok(Some(ctx.args.join(" ")))
        }
    }

    struct Count(Arc<AtomicUsize>, bool);

    #[async_trait]
    impl EventHandler for Count {
        async fn handle(&self, _ctx: &EventContext) -> Result<(), PluginError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                Err(PluginError::runtime("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn message(content: &str, bot: bool) -> MessageCreate {
        MessageCreate {
            id: "1".into(),
            channel_id: "2".into(),
            guild_id: Some("3".into()),
            content: content.into(),
            author: Author {
                id: "4".into(),
                username: "user".into(),
                bot,
            },
        }
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let mut registry = HookRegistry::new();
        registry.begin("a");
        registry.add_command("Echo", "", Echo).unwrap();
        let err = registry.add_command("echo", "", Echo).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateCommand(name) if name == "echo"));
    }

    #[test]
    fn test_bad_command_name_rejected() {
        let mut registry = HookRegistry::new();
        assert!(registry.add_command("two words", "", Echo).is_err());
        assert!(registry.add_command("", "", Echo).is_err());
    }

    #[test]
    fn test_reserved_and_duplicate_routes_rejected() {
        let mut registry = HookRegistry::new();
        assert!(matches!(
            registry.mount("/healthz", get(|| async { "x" })),
            Err(PluginError::DuplicateRoute(_))
        ));
        registry.mount("/api/thing", get(|| async { "x" })).unwrap();
        assert!(registry.mount("/api/thing", get(|| async { "y" })).is_err());
        assert!(registry.mount("relative", get(|| async { "y" })).is_err());
    }

    #[test]
    fn test_parse_command() {
        let mut registry = HookRegistry::new();
        registry.add_command("echo", "", Echo).unwrap();
        let hooks = registry.freeze();

        let (cmd, args) = hooks.parse_command("-", "-ECHO hello  world").unwrap();
        assert_eq!(cmd.name, "echo");
        assert_eq!(args, vec!["hello", "world"]);

        assert!(hooks.parse_command("-", "echo hello").is_none());
        assert!(hooks.parse_command("-", "-unknown").is_none());
        assert!(hooks.parse_command("-", "-").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_runs_all_subscribers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        registry.begin("a");
        registry.subscribe("GUILD_CREATE", Count(hits.clone(), true));
        registry.begin("b");
        registry.subscribe("GUILD_CREATE", Count(hits.clone(), false));
        let hooks = registry.freeze();

        let state = offline_state().await;
        let event = Event {
            name: "GUILD_CREATE".into(),
            data: Value::Null,
        };
        assert_eq!(hooks.dispatch_event(&state, event).await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.plugins(), &["a", "b"]);

        let other = Event {
            name: "TYPING_START".into(),
            data: Value::Null,
        };
        assert_eq!(hooks.dispatch_event(&state, other).await, 0);
    }

    #[tokio::test]
    async fn test_handle_message_ignores_bots() {
        let mut registry = HookRegistry::new();
        registry.add_command("echo", "", Echo).unwrap();
        let hooks = Arc::new(registry.freeze());
        let state = offline_state().await;

        let reply = hooks.handle_message(&state, message("-echo hi", false)).await.unwrap();
        assert_eq!(reply.as_deref(), Some("hi"));

        let reply = hooks.handle_message(&state, message("-echo hi", true)).await.unwrap();
        assert_eq!(reply, None);
    }
}
