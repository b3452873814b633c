//! Periodic statistics loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use super::{Service, ServiceError};
use crate::observability::metrics;
use crate::state::SharedState;
use crate::store::{keys, StoreConnection, StoreError};

/// Values read on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connected_guilds: i64,
    pub messages_total: i64,
}

pub struct StatsLoop;

#[async_trait]
impl Service for StatsLoop {
    fn name(&self) -> &'static str {
        "stats"
    }

    async fn run(self: Box<Self>, state: SharedState) -> Result<(), ServiceError> {
        let interval = Duration::from_secs(state.config().stats.interval_secs);
        tracing::info!(interval_secs = interval.as_secs(), "Stats loop starting");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match update_once(&state).await {
                Ok(snapshot) => tracing::info!(
                    connected_guilds = snapshot.connected_guilds,
                    messages_total = snapshot.messages_total,
                    "Stats updated"
                ),
                Err(e) => tracing::warn!(error = %e, "Stats update failed"),
            }
        }
    }
}

/// Read the current counters from the store and publish them as gauges.
pub async fn update_once(state: &SharedState) -> Result<StatsSnapshot, ServiceError> {
    let mut conn = state.pool().get().await?;
    let result = read_snapshot(&mut conn).await;
    let released = conn.release(result.is_err()).await;
    let snapshot = result?;
    released?;

    metrics::record_connected_guilds(snapshot.connected_guilds);
    metrics::record_messages_total(snapshot.messages_total);
    Ok(snapshot)
}

async fn read_snapshot(conn: &mut StoreConnection) -> Result<StatsSnapshot, StoreError> {
    let connected_guilds = conn.scard(keys::CONNECTED_GUILDS).await?;
    let messages_total = match conn.get(keys::MESSAGES_TOTAL).await? {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key = keys::MESSAGES_TOTAL, value = %value, "Counter is not an integer");
            0
        }),
        None => 0,
    };

    Ok(StatsSnapshot {
        connected_guilds,
        messages_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::offline_state;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn scripted(replies: &'static [&'static [u8]]) -> StoreConnection {
        let (client, mut server) = duplex(4096);
        tokio::spawn(async move {
            for reply in replies {
                let mut buf = vec![0u8; 1024];
                if server.read(&mut buf).await.unwrap_or(0) == 0 {
                    return;
                }
                let _ = server.write_all(reply).await;
            }
        });
        StoreConnection::new(Box::new(client))
    }

    #[tokio::test]
    async fn test_read_snapshot() {
        let mut conn = scripted(&[b":4\r\n", b"$2\r\n17\r\n"]);
        let snapshot = read_snapshot(&mut conn).await.unwrap();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                connected_guilds: 4,
                messages_total: 17
            }
        );
    }

    #[tokio::test]
    async fn test_missing_and_garbage_counters_read_as_zero() {
        let mut conn = scripted(&[b":0\r\n", b"$-1\r\n"]);
        assert_eq!(read_snapshot(&mut conn).await.unwrap(), StatsSnapshot::default());

        let mut conn = scripted(&[b":1\r\n", b"$3\r\nabc\r\n"]);
        assert_eq!(read_snapshot(&mut conn).await.unwrap().messages_total, 0);
    }

    #[tokio::test]
    async fn test_update_requires_store() {
        let state = offline_state().await;
        assert!(matches!(update_once(&state).await, Err(ServiceError::Pool(_))));
    }
}
