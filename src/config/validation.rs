//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, pool sizes, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BotConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BotConfig, Transport};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BotConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| {
        errors.push(ValidationError { field, message });
    };

    if config.bot.token.trim().is_empty() {
        fail("bot.token", "must not be empty".into());
    }
    if url::Url::parse(&config.bot.api_base).is_err() {
        fail("bot.api_base", format!("invalid URL '{}'", config.bot.api_base));
    }
    if let Some(gateway) = &config.bot.gateway_url {
        if url::Url::parse(gateway).is_err() {
            fail("bot.gateway_url", format!("invalid URL '{}'", gateway));
        }
    }
    if config.bot.request_timeout_secs == 0 {
        fail("bot.request_timeout_secs", "must be greater than 0".into());
    }
    if config.bot.command_prefix.is_empty() {
        fail("bot.command_prefix", "must not be empty".into());
    }

    if config.store.address.is_empty() {
        fail("store.address", "must not be empty".into());
    } else if config.store.transport == Transport::Tcp
        && config.store.address.parse::<SocketAddr>().is_err()
        && !config.store.address.contains(':')
    {
        fail("store.address", format!("'{}' is not host:port", config.store.address));
    }
    if config.store.connect_timeout_secs == 0 {
        fail("store.connect_timeout_secs", "must be greater than 0".into());
    }
    if config.store.max_connections == 0 {
        fail("store.max_connections", "must be greater than 0".into());
    }
    if config.store.warm_connections > config.store.max_connections {
        fail(
            "store.warm_connections",
            format!(
                "{} exceeds max_connections {}",
                config.store.warm_connections, config.store.max_connections
            ),
        );
    }

    if config.web.listen_address.parse::<SocketAddr>().is_err() {
        fail("web.listen_address", format!("invalid socket address '{}'", config.web.listen_address));
    }
    if config.web.request_timeout_secs == 0 {
        fail("web.request_timeout_secs", "must be greater than 0".into());
    }
    if config.reddit.poll_interval_secs == 0 {
        fail("reddit.poll_interval_secs", "must be greater than 0".into());
    }
    if config.stats.interval_secs == 0 {
        fail("stats.interval_secs", "must be greater than 0".into());
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        fail("retries.base_delay_ms", "must not exceed retries.max_delay_ms".into());
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        fail(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> BotConfig {
        let mut config = BotConfig::default();
        config.bot.token = "secret".into();
        config
    }

    #[test]
    fn test_defaults_with_token_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let errors = validate_config(&BotConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "bot.token");
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = valid();
        config.store.max_connections = 0;
        config.stats.interval_secs = 0;
        config.web.listen_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"store.max_connections"));
        assert!(fields.contains(&"store.warm_connections"));
        assert!(fields.contains(&"stats.interval_secs"));
        assert!(fields.contains(&"web.listen_address"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = valid();
        config.bot.request_timeout_secs = 0;
        config.web.request_timeout_secs = 0;
        config.store.connect_timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["bot.request_timeout_secs", "store.connect_timeout_secs", "web.request_timeout_secs"]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError {
            field: "stats.interval_secs",
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "stats.interval_secs: must be greater than 0");
    }

    #[test]
    fn test_unix_socket_path_accepted() {
        let mut config = valid();
        config.store.transport = Transport::Unix;
        config.store.address = "/var/run/store.sock".into();
        assert!(validate_config(&config).is_ok());
    }
}
