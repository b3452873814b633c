//! External feed poller.
//!
//! Polls a listing endpoint and reports posts newer than the last one seen.
//! Post ids are base36 and grow monotonically, so "newer" is a numeric
//! comparison on the decoded id. The newest id processed is kept in the
//! store so restarts do not replay old posts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time;

use super::{Service, ServiceError};
use crate::config::RedditConfig;
use crate::observability::metrics;
use crate::state::SharedState;
use crate::store::{keys, StoreConnection};

/// A post from the listing feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

/// Decode a base36 post id.
pub fn parse_post_id(id: &str) -> Option<u64> {
    u64::from_str_radix(id, 36).ok()
}

/// Extract posts from a listing document.
pub fn parse_listing(body: &str) -> Result<Vec<Post>, serde_json::Error> {
    let listing: Listing = serde_json::from_str(body)?;
    Ok(listing.data.children.into_iter().map(|c| c.data).collect())
}

/// Posts strictly newer than `last_seen`, oldest first.
///
/// Posts with undecodable ids are skipped.
pub fn new_posts(posts: &[Post], last_seen: u64) -> Vec<&Post> {
    let mut fresh: Vec<(u64, &Post)> = posts
        .iter()
        .filter_map(|p| parse_post_id(&p.id).map(|n| (n, p)))
        .filter(|(n, _)| *n > last_seen)
        .collect();
    fresh.sort_by_key(|(n, _)| *n);
    fresh.dedup_by_key(|(n, _)| *n);
    fresh.into_iter().map(|(_, p)| p).collect()
}

/// Polls the configured feed on a fixed interval.
pub struct Poller;

#[async_trait]
impl Service for Poller {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn run(self: Box<Self>, state: SharedState) -> Result<(), ServiceError> {
        let config = &state.config().reddit;
        let client = feed_client(config)?;

        tracing::info!(
            feed = %config.feed_url,
            interval_secs = config.poll_interval_secs,
            "Feed poller starting"
        );

        let mut ticker = time::interval(Duration::from_secs(config.poll_interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match poll_once(&state, &client).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "New feed posts"),
                Err(e) => tracing::warn!(error = %e, "Feed poll failed"),
            }
        }
    }
}

fn feed_client(config: &RedditConfig) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Fetch the feed once and record anything new. Returns the number of new posts.
pub async fn poll_once(state: &SharedState, client: &reqwest::Client) -> Result<usize, ServiceError> {
    let body = client
        .get(&state.config().reddit.feed_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let posts = parse_listing(&body)?;

    let mut conn = state.pool().get().await?;
    let result = advance(&mut conn, &posts).await;
    let released = conn.release(matches!(result, Err(ServiceError::Store(_)))).await;
    let count = result?;
    released?;
    Ok(count)
}

async fn advance(conn: &mut StoreConnection, posts: &[Post]) -> Result<usize, ServiceError> {
    let last_seen = conn
        .get(keys::REDDIT_LAST_POST)
        .await?
        .and_then(|id| parse_post_id(&id));

    // First run: start from the newest post instead of replaying the feed
    let Some(last_seen) = last_seen else {
        if let Some(newest) = new_posts(posts, 0).last() {
            conn.set(keys::REDDIT_LAST_POST, &newest.id).await?;
            tracing::info!(id = %newest.id, "Feed position initialized");
        }
        return Ok(0);
    };

    let fresh = new_posts(posts, last_seen);
    for post in &fresh {
        tracing::info!(
            id = %post.id,
            subreddit = %post.subreddit,
            title = %post.title,
            "New post"
        );
    }
    if let Some(newest) = fresh.last() {
        conn.set(keys::REDDIT_LAST_POST, &newest.id).await?;
    }

    metrics::record_reddit_posts(fresh.len() as u64);
    Ok(fresh.len())
}
