//! Bounded connection pool with scoped checkouts.
//!
//! # Responsibilities
//! - Enforce a fixed maximum of live connections via a semaphore
//! - Reuse idle connections, dial new ones on demand
//! - Hand out RAII checkouts that are released exactly once
//!
//! # Design Decisions
//! - A checkout that saw an error is closed, never returned to the idle set
//! - Dropping an unreleased checkout (early return, panic) discards the
//!   connection but still frees the slot and counts as a release
//! - A failed dial frees its slot and records no release

use std::fmt;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::Transport;
use crate::observability::metrics;

/// A connection that can live in a [`ConnectionPool`].
pub trait PoolConnection: Send + 'static {
    /// True once the connection has seen an error that makes reuse unsafe.
    fn is_broken(&self) -> bool;

    /// Close the underlying transport.
    fn close(self) -> BoxFuture<'static, io::Result<()>>
    where
        Self: Sized;
}

/// Dial function: opens one connection of the given transport to an endpoint.
pub type DialFn<C> = Arc<dyn Fn(Transport, String) -> BoxFuture<'static, io::Result<C>> + Send + Sync>;

/// Errors produced by the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to dial {transport}://{endpoint}: {source}")]
    Dial {
        transport: Transport,
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("connection pool closed")]
    Closed,

    #[error("failed to close discarded connection: {0}")]
    Release(#[source] io::Error),
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful checkouts.
    pub acquired: u64,
    /// Checkouts given back (explicitly or by drop).
    pub released: u64,
    /// Connections closed instead of being returned to the idle set.
    pub discarded: u64,
    /// Dial attempts that failed.
    pub dial_failures: u64,
    /// Connections currently idle.
    pub idle: usize,
}

struct PoolShared<C> {
    transport: Transport,
    endpoint: String,
    max_size: usize,
    idle: Mutex<Vec<C>>,
    slots: Arc<Semaphore>,
    dial: DialFn<C>,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    dial_failures: AtomicU64,
}

impl<C> PoolShared<C> {
    fn take_idle(&self) -> Option<C> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn put_idle(&self, conn: C) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).push(conn);
    }

    fn idle_len(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A bounded pool of connections to a single endpoint.
pub struct ConnectionPool<C> {
    shared: Arc<PoolShared<C>>,
}

impl<C> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("transport", &self.shared.transport)
            .field("endpoint", &self.shared.endpoint)
            .field("max_size", &self.shared.max_size)
            .finish()
    }
}

impl<C: PoolConnection> ConnectionPool<C> {
    /// Create a pool and eagerly dial `warm` connections.
    ///
    /// Fails if the sizing is invalid or any warm-up dial fails.
    pub async fn connect(
        transport: Transport,
        endpoint: impl Into<String>,
        max_size: usize,
        warm: usize,
        dial: DialFn<C>,
    ) -> Result<Self, PoolError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(PoolError::InvalidConfig("endpoint must not be empty".into()));
        }
        if max_size == 0 {
            return Err(PoolError::InvalidConfig("max size must be greater than 0".into()));
        }
        if warm > max_size {
            return Err(PoolError::InvalidConfig(format!(
                "warm connections ({warm}) exceed max size ({max_size})"
            )));
        }

        let pool = Self {
            shared: Arc::new(PoolShared {
                transport,
                endpoint,
                max_size,
                idle: Mutex::new(Vec::with_capacity(max_size)),
                slots: Arc::new(Semaphore::new(max_size)),
                dial,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                dial_failures: AtomicU64::new(0),
            }),
        };

        for _ in 0..warm {
            let conn = pool.dial().await?;
            pool.shared.put_idle(conn);
        }

        tracing::info!(
            transport = %pool.shared.transport,
            endpoint = %pool.shared.endpoint,
            max_size,
            warm,
            "Connection pool ready"
        );

        Ok(pool)
    }

    async fn dial(&self) -> Result<C, PoolError> {
        let shared = &self.shared;
        match (shared.dial)(shared.transport, shared.endpoint.clone()).await {
            Ok(conn) => Ok(conn),
            Err(source) => {
                shared.dial_failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_checkout("dial_failed");
                Err(PoolError::Dial {
                    transport: shared.transport,
                    endpoint: shared.endpoint.clone(),
                    source,
                })
            }
        }
    }

    /// Check out a connection, waiting for a free slot if the pool is exhausted.
    pub async fn get(&self) -> Result<PooledConnection<C>, PoolError> {
        let permit = self
            .shared
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        // On dial failure the permit drops here and the slot is free again
        let conn = match self.shared.take_idle() {
            Some(conn) => conn,
            None => self.dial().await?,
        };

        self.shared.acquired.fetch_add(1, Ordering::Relaxed);
        metrics::record_checkout("acquired");

        tracing::trace!(
            available = self.shared.slots.available_permits(),
            "Connection checked out"
        );

        Ok(PooledConnection {
            conn: Some(conn),
            _permit: permit,
            shared: self.shared.clone(),
        })
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.shared.acquired.load(Ordering::Relaxed),
            released: self.shared.released.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
            dial_failures: self.shared.dial_failures.load(Ordering::Relaxed),
            idle: self.shared.idle_len(),
        }
    }

    /// Slots not currently checked out.
    pub fn available(&self) -> usize {
        self.shared.slots.available_permits()
    }

    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }
}

/// A checked-out connection.
///
/// Give it back with [`PooledConnection::release`]. If it is dropped instead,
/// the connection is discarded and the slot freed.
pub struct PooledConnection<C: PoolConnection> {
    conn: Option<C>,
    _permit: OwnedSemaphorePermit,
    shared: Arc<PoolShared<C>>,
}

impl<C: PoolConnection> PooledConnection<C> {
    /// Return the connection to the pool.
    ///
    /// When `failed` is set or the connection reports itself broken, it is
    /// closed rather than reused; a close error is returned as
    /// [`PoolError::Release`]. The release is recorded either way.
    pub async fn release(mut self, failed: bool) -> Result<(), PoolError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.shared.released.fetch_add(1, Ordering::Relaxed);

        if failed || conn.is_broken() {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            metrics::record_checkout("discarded");
            tracing::debug!(failed, broken = conn.is_broken(), "Discarding pooled connection");
            conn.close().await.map_err(PoolError::Release)
        } else {
            self.shared.put_idle(conn);
            Ok(())
        }
    }
}

impl<C: PoolConnection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection present until released")
    }
}

impl<C: PoolConnection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection present until released")
    }
}

impl<C: PoolConnection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.released.fetch_add(1, Ordering::Relaxed);
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            metrics::record_checkout("dropped");
            tracing::warn!("Pooled connection dropped without release; discarding");
            drop(conn);
        }
    }
}
