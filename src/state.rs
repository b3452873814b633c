//! Process-wide shared state.
//!
//! Holds the validated configuration, the store pool and the client session.
//! Built once during startup, after which it is only read. Every plugin and
//! service receives a clone; clones share the same underlying handles.

use std::sync::Arc;

use thiserror::Error;

use crate::config::BotConfig;
use crate::resilience::Backoff;
use crate::session::{Session, SessionError};
use crate::store::{self, PoolError, StorePool};

/// Failure to build one of the shared handles.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed initializing client session: {0}")]
    Session(#[source] SessionError),

    #[error("failed initializing store pool: {0}")]
    Pool(#[source] PoolError),
}

/// Read-only context shared by plugins, services and actions.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

struct StateInner {
    config: BotConfig,
    pool: StorePool,
    session: Session,
}

impl SharedState {
    /// Assemble state from handles that already exist.
    pub fn new(config: BotConfig, pool: StorePool, session: Session) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                pool,
                session,
            }),
        }
    }

    /// Build the session and the store pool from `config`.
    ///
    /// The session is created first; a pool failure is reported even though
    /// the session succeeded, and nothing is published on either failure.
    pub async fn initialize(config: BotConfig) -> Result<Self, InitError> {
        let session = Session::new(&config.bot, Backoff::from(&config.retries))
            .map_err(InitError::Session)?;

        let pool = store::connect_pool(&config.store)
            .await
            .map_err(InitError::Pool)?;

        Ok(Self::new(config, pool, session))
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &StorePool {
        &self.inner.pool
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("pool", &self.inner.pool)
            .field("session", &self.inner.session)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_fails_without_token() {
        let err = SharedState::initialize(BotConfig::default()).await.unwrap_err();
        assert!(matches!(err, InitError::Session(SessionError::MissingToken)));
    }

    #[tokio::test]
    async fn test_initialize_fails_when_store_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = BotConfig::default();
        config.bot.token = "t".into();
        config.store.address = addr.to_string();
        config.store.connect_timeout_secs = 1;

        let err = SharedState::initialize(config).await.unwrap_err();
        assert!(matches!(err, InitError::Pool(PoolError::Dial { .. })));
    }

    #[tokio::test]
    async fn test_clones_share_handles() {
        let state = testing::offline_state().await;
        let other = state.clone();
        assert_eq!(state.session().id(), other.session().id());
        assert_eq!(other.pool().max_size(), 100);
    }
}
