//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BotConfig (validated, immutable)
//!     → owned by SharedState, read by every plugin and service
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BotConfig, ObservabilityConfig, RedditConfig, RetryConfig, SessionConfig, StatsConfig,
    StoreConfig, Transport, WebConfig,
};
