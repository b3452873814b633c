//! One-shot maintenance actions.
//!
//! # Data Flow
//! ```text
//! --action <name>
//!     → run_action(state, name)
//!         → pool.get()              (scoped checkout)
//!         → dispatch(name, conn)    (exactly one handler)
//!         → checkout.release(failed)
//!     → logged outcome + exit code
//! ```
//!
//! # Design Decisions
//! - The checkout happens before the name is resolved, so an unknown name
//!   still acquires and releases exactly once
//! - A failed acquisition never records a release
//! - A release error is reported on its own and never replaces the
//!   action's error

pub mod connected;

use thiserror::Error;

use crate::observability::metrics;
use crate::session::SessionError;
use crate::state::SharedState;
use crate::store::{PoolError, StoreConnection, StoreError};

/// Names accepted by `--action`.
pub const ACTIONS: &[&str] = &["connected"];

/// Errors from the action runner.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to check out a store connection: {0}")]
    Checkout(#[source] PoolError),

    #[error("unrecognized action '{0}' (known: {known})", known = ACTIONS.join(", "))]
    Unrecognized(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to release store connection: {0}")]
    Release(#[source] PoolError),
}

/// Run the named action to completion and log its outcome.
pub async fn run_action(state: &SharedState, name: &str) -> Result<(), ActionError> {
    tracing::info!(action = name, "Running action");

    let result = execute(state, name).await;
    match &result {
        Ok(()) => tracing::info!(action = name, "Action completed"),
        Err(e) => tracing::error!(action = name, error = %e, "Action failed"),
    }
    metrics::record_action(name, result.is_ok());
    result
}

async fn execute(state: &SharedState, name: &str) -> Result<(), ActionError> {
    let mut conn = state.pool().get().await.map_err(ActionError::Checkout)?;

    let result = dispatch(state, name, &mut conn).await;
    let failed = matches!(result, Err(ActionError::Store(_)));
    let released = conn.release(failed).await;

    match (result, released) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(e)) => Err(ActionError::Release(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release)) => {
            tracing::error!(action = name, error = %release, "Failed to release store connection");
            Err(e)
        }
    }
}

async fn dispatch(state: &SharedState, name: &str, conn: &mut StoreConnection) -> Result<(), ActionError> {
    match name {
        "connected" => {
            let count = connected::refresh_connected_guilds(state.session(), conn).await?;
            metrics::record_connected_guilds(count as i64);
            tracing::info!(guilds = count, "Refreshed connected guilds");
            Ok(())
        }
        other => Err(ActionError::Unrecognized(other.to_string())),
    }
}
