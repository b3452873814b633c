//! Key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! StoreConfig
//!     → connection.rs (dial tcp/unix, RESP commands)
//!     → pool.rs (bounded pool, scoped checkouts)
//!     → StorePool held by SharedState, checked out by actions and services
//! ```
//!
//! # Design Decisions
//! - One pool per process, created before any plugin or service runs
//! - Checkouts are RAII guards; release happens exactly once

pub mod connection;
pub mod pool;

use std::time::Duration;

pub use connection::{Reply, StoreConnection, StoreError};
pub use pool::{ConnectionPool, PoolConnection, PoolError, PoolStats, PooledConnection};

use crate::config::StoreConfig;

/// Keys shared between actions, plugins and services.
pub mod keys {
    /// Set of guild ids the bot is currently in.
    pub const CONNECTED_GUILDS: &str = "connected_guilds";
    /// Counter of messages seen across all guilds.
    pub const MESSAGES_TOTAL: &str = "stats:messages_total";
    /// Base36 id of the newest feed post processed.
    pub const REDDIT_LAST_POST: &str = "reddit:last_post";
}

/// The process-wide store pool.
pub type StorePool = ConnectionPool<StoreConnection>;

/// A checked-out store connection.
pub type StoreCheckout = PooledConnection<StoreConnection>;

/// Build the store pool described by `config`.
pub async fn connect_pool(config: &StoreConfig) -> Result<StorePool, PoolError> {
    ConnectionPool::connect(
        config.transport,
        config.address.clone(),
        config.max_connections,
        config.warm_connections,
        connection::dialer(Duration::from_secs(config.connect_timeout_secs)),
    )
    .await
}
