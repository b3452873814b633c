//! REST and gateway data types plus session errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during session construction or REST calls.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No bot token configured.
    #[error("bot token is empty")]
    MissingToken,

    /// Token contains characters not allowed in a header.
    #[error("bot token is not a valid header value")]
    InvalidToken,

    /// Base URL does not parse.
    #[error("invalid API base URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Request failed at the transport level after all retries.
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// A guild as listed for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Gateway connection info.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}

/// Message author.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Payload of a `MESSAGE_CREATE` dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Author,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_create_tolerates_missing_fields() {
        let msg: MessageCreate = serde_json::from_str(
            r#"{"id":"1","channel_id":"2","content":"-ping","author":{"id":"3"}}"#,
        )
        .unwrap();
        assert_eq!(msg.guild_id, None);
        assert!(!msg.author.bot);
        assert_eq!(msg.content, "-ping");
    }
}
