//! Plugin framework.
//!
//! # Data Flow
//! ```text
//! plugins::builtin() → PluginRegistry (ordered)
//!     → attach_all(&SharedState)
//!         → Plugin::attach(state, &mut HookRegistry)   (one by one, fail-fast)
//!     → Hooks (frozen commands, subscriptions, routes)
//! ```

pub mod hooks;
pub mod registry;
pub mod traits;
pub mod types;

pub use hooks::{Command, CommandContext, Event, EventContext, HookRegistry, Hooks};
pub use registry::PluginRegistry;
pub use traits::{CommandHandler, EventHandler, Plugin};
pub use types::PluginError;
