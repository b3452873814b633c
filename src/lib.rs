//! Plugin-based chat bot runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI flags ──▶ Selection ──(empty)──▶ exit 2
//!                    │
//!                    ▼
//!   config.toml ──▶ BotConfig ──▶ SharedState { config, store pool, session }
//!                                      │
//!                                      ▼
//!                    PluginRegistry::attach_all ──▶ Hooks (commands, events, routes)
//!                                      │
//!                  ┌───────────────────┴───────────────────┐
//!                  ▼                                       ▼
//!          Action runner                            ServiceGroup
//!   (one checkout, one action, exit)     ┌──────────┬──────────┬──────────┐
//!                                        │   bot    │   web    │  reddit  │  stats
//!                                        │ gateway  │  axum    │  feed    │  store
//!                                        │  loop    │ listener │  poller  │  gauges
//!                                        └──────────┴──────────┴──────────┘
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod plugin;
pub mod plugins;
pub mod resilience;
pub mod services;
pub mod session;
pub mod state;
pub mod store;

pub use cli::Cli;
pub use config::BotConfig;
pub use state::SharedState;
