//! Resident services.
//!
//! # Data Flow
//! ```text
//! Selection → [ServiceKind] → build(kind, hooks) → Box<dyn Service>
//!     → ServiceGroup::launch (one task each, no ordering between them)
//!         → Service::run(state) loops until process exit
//! ```
//!
//! # Design Decisions
//! - Services own their retry loops; an `Err` from `run` means the service
//!   gave up and is only logged by the supervisor
//! - Services see plugin registrations only through the frozen `Hooks`

pub mod client_loop;
pub mod reddit;
pub mod stats;
pub mod web;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::plugin::Hooks;
use crate::session::SessionError;
use crate::state::SharedState;
use crate::store::{PoolError, StoreError};

pub use client_loop::ClientLoop;
pub use reddit::Poller;
pub use stats::StatsLoop;
pub use web::HttpListener;

/// The fixed catalog of resident services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    ClientLoop,
    HttpListener,
    Poller,
    StatsLoop,
}

impl ServiceKind {
    /// Every service, in launch order.
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::ClientLoop,
        ServiceKind::HttpListener,
        ServiceKind::Poller,
        ServiceKind::StatsLoop,
    ];

    /// Name used in logs and metrics, matching the CLI flag.
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::ClientLoop => "bot",
            ServiceKind::HttpListener => "web",
            ServiceKind::Poller => "reddit",
            ServiceKind::StatsLoop => "stats",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that end a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] io::Error),

    #[error("gateway connection error: {0}")]
    Gateway(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    #[error("gateway closed the connection: {0}")]
    Closed(String),

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("feed request failed: {0}")]
    Feed(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A long-running unit of work.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Run until the process exits. Returning means the service stopped.
    async fn run(self: Box<Self>, state: SharedState) -> Result<(), ServiceError>;
}

/// Construct the service for `kind`.
pub fn build(kind: ServiceKind, hooks: &Arc<Hooks>) -> Box<dyn Service> {
    match kind {
        ServiceKind::ClientLoop => Box::new(ClientLoop::new(hooks.clone())),
        ServiceKind::HttpListener => Box::new(HttpListener::new(hooks.clone())),
        ServiceKind::Poller => Box::new(Poller),
        ServiceKind::StatsLoop => Box::new(StatsLoop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginRegistry;
    use crate::state::testing::offline_state;

    #[test]
    fn test_names_match_flags() {
        let names: Vec<_> = ServiceKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["bot", "web", "reddit", "stats"]);
    }

    #[tokio::test]
    async fn test_build_names() {
        let hooks = Arc::new(PluginRegistry::new().attach_all(&offline_state().await).unwrap());
        for kind in ServiceKind::ALL {
            assert_eq!(build(kind, &hooks).name(), kind.name());
        }
    }
}
