//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bot.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the bot process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BotConfig {
    /// Chat platform credentials and REST settings.
    pub bot: SessionConfig,

    /// Key-value store connection pool.
    pub store: StoreConfig,

    /// Web server settings.
    pub web: WebConfig,

    /// External feed poller settings.
    pub reddit: RedditConfig,

    /// Periodic statistics loop settings.
    pub stats: StatsConfig,

    /// Backoff settings shared by retrying loops.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chat platform session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bot token used for REST and gateway authentication.
    pub token: String,

    /// REST API base URL.
    pub api_base: String,

    /// Gateway URL override. Resolved through the REST API when unset.
    pub gateway_url: Option<String>,

    /// Prefix that marks a chat message as a command.
    pub command_prefix: String,

    /// Maximum retries for a single REST request.
    pub max_rest_retries: u32,

    /// REST request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Gateway intents bitmask sent on identify.
    pub intents: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: None,
            command_prefix: "-".to_string(),
            max_rest_retries: 3,
            request_timeout_secs: 10,
            // GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | MESSAGE_CONTENT
            intents: 1 | (1 << 1) | (1 << 9) | (1 << 15),
        }
    }
}

/// Transport used to reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Unix,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Unix => write!(f, "unix"),
        }
    }
}

/// Store connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Transport kind (tcp or unix).
    pub transport: Transport,

    /// Store address (e.g., "127.0.0.1:6379" or a socket path).
    pub address: String,

    /// Maximum concurrent connections held by the pool.
    pub max_connections: usize,

    /// Connections dialed eagerly at startup to verify reachability.
    pub warm_connections: usize,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Tcp,
            address: "127.0.0.1:6379".to_string(),
            max_connections: 100,
            warm_connections: 1,
            connect_timeout_secs: 5,
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub listen_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Feed poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedditConfig {
    /// Listing endpoint returning the newest posts.
    pub feed_url: String,

    /// Poll interval in seconds.
    pub poll_interval_secs: u64,

    /// User agent sent with feed requests.
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://www.reddit.com/r/all/new.json?limit=100".to_string(),
            poll_interval_secs: 5,
            user_agent: concat!("guildbot/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Statistics loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Interval between statistics updates in seconds.
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Backoff configuration for reconnecting and retrying loops.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
