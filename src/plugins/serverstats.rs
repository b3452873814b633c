//! Per-guild message counters.
//!
//! Counts live in memory for the lifetime of the process; the global total
//! is also kept in the store so the stats loop can report it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::Json;
use dashmap::DashMap;
use serde::Serialize;

use crate::plugin::{CommandContext, CommandHandler, EventContext, EventHandler, HookRegistry, Plugin, PluginError};
use crate::session::MessageCreate;
use crate::state::SharedState;
use crate::store::keys;

/// Message counts keyed by guild id.
#[derive(Debug, Default)]
pub struct MessageCounters {
    per_guild: DashMap<String, u64>,
}

impl MessageCounters {
    /// Count one message, returning the guild's new total.
    pub fn record(&self, guild_id: &str) -> u64 {
        let mut entry = self.per_guild.entry(guild_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get(&self, guild_id: &str) -> u64 {
        self.per_guild.get(guild_id).map_or(0, |c| *c)
    }

    pub fn total(&self) -> u64 {
        self.per_guild.iter().map(|c| *c.value()).sum()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.per_guild
            .iter()
            .map(|c| (c.key().clone(), *c.value()))
            .collect()
    }
}

pub struct ServerStatsPlugin {
    counters: Arc<MessageCounters>,
}

impl ServerStatsPlugin {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(MessageCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<MessageCounters> {
        self.counters.clone()
    }
}

impl Default for ServerStatsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ServerStatsPlugin {
    fn name(&self) -> &'static str {
        "serverstats"
    }

    fn attach(&self, _state: &SharedState, hooks: &mut HookRegistry) -> Result<(), PluginError> {
        hooks.subscribe(
            "MESSAGE_CREATE",
            CountMessages {
                counters: self.counters.clone(),
            },
        );
        hooks.add_command(
            "stats",
            "Show how many messages this server has sent",
            StatsCommand {
                counters: self.counters.clone(),
            },
        )?;
        hooks.mount("/api/stats", get(stats_route).with_state(self.counters.clone()))?;
        Ok(())
    }
}

struct CountMessages {
    counters: Arc<MessageCounters>,
}

#[async_trait]
impl EventHandler for CountMessages {
    async fn handle(&self, ctx: &EventContext) -> Result<(), PluginError> {
        let message: MessageCreate =
            serde_json::from_value(ctx.event.data.clone()).map_err(|e| PluginError::Runtime {
                message: "malformed MESSAGE_CREATE payload".into(),
                source: Some(Box::new(e)),
            })?;

        if message.author.bot {
            return Ok(());
        }
        let Some(guild_id) = message.guild_id.as_deref() else {
            return Ok(());
        };
        self.counters.record(guild_id);

        let mut conn = ctx.state.pool().get().await?;
        let result = conn.incr(keys::MESSAGES_TOTAL).await;
        let released = conn.release(result.is_err()).await;
        let total = result?;
        released?;

        tracing::trace!(guild_id, total, "Message counted");
        Ok(())
    }
}

struct StatsCommand {
    counters: Arc<MessageCounters>,
}

#[async_trait]
impl CommandHandler for StatsCommand {
    async fn run(&self, ctx: CommandContext) -> Result<Option<String>, PluginError> {
        let reply = match ctx.message.guild_id.as_deref() {
            Some(guild_id) => format!(
                "{} messages seen in this server since startup",
                self.counters.get(guild_id)
            ),
            None => "Stats are only tracked in servers".to_string(),
        };
        Ok(Some(reply))
    }
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total: u64,
    guilds: BTreeMap<String, u64>,
}

async fn stats_route(State(counters): State<Arc<MessageCounters>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        total: counters.total(),
        guilds: counters.snapshot(),
    })
}
