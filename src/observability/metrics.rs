//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guildbot_services_launched_total` (counter): services started, by service
//! - `guildbot_actions_total` (counter): one-shot actions, by action and outcome
//! - `guildbot_pool_checkouts_total` (counter): pool checkouts, by outcome
//! - `guildbot_gateway_events_total` (counter): gateway dispatches, by event
//! - `guildbot_reddit_posts_total` (counter): new feed posts observed
//! - `guildbot_connected_guilds` (gauge): size of the connected guild set
//! - `guildbot_messages_total` (gauge): messages counted by the stats plugin
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_service_launched(service: &'static str) {
    counter!("guildbot_services_launched_total", "service" => service).increment(1);
}

pub fn record_action(action: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("guildbot_actions_total", "action" => action.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_checkout(outcome: &'static str) {
    counter!("guildbot_pool_checkouts_total", "outcome" => outcome).increment(1);
}

pub fn record_gateway_event(event: &str) {
    counter!("guildbot_gateway_events_total", "event" => event.to_string()).increment(1);
}

pub fn record_reddit_posts(count: u64) {
    counter!("guildbot_reddit_posts_total").increment(count);
}

pub fn record_connected_guilds(count: i64) {
    gauge!("guildbot_connected_guilds").set(count as f64);
}

pub fn record_messages_total(count: i64) {
    gauge!("guildbot_messages_total").set(count as f64);
}
