//! REST session with bounded retries.
//!
//! # Responsibilities
//! - Authenticate every request with the bot token
//! - Retry rate-limited and transient failures up to `max_rest_retries`
//! - Expose the few REST calls the orchestrator and built-ins need

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::resilience::retries::{is_retryable_error, is_retryable_status};
use crate::resilience::Backoff;
use crate::session::types::{GatewayInfo, Guild, SessionError, SessionResult};

/// Authenticated REST session, shared by every component.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    http: reqwest::Client,
    api_base: String,
    token: String,
    gateway_override: Option<String>,
    intents: u64,
    max_rest_retries: u32,
    backoff: Backoff,
}

impl Session {
    /// Build a session from configuration.
    ///
    /// No request is made here; failures are limited to invalid credentials
    /// or URLs and HTTP client construction.
    pub fn new(config: &SessionConfig, backoff: Backoff) -> SessionResult<Self> {
        let token = config.token.trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        url::Url::parse(&config.api_base).map_err(|source| SessionError::InvalidUrl {
            url: config.api_base.clone(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| SessionError::InvalidToken)?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("guildbot/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(SessionError::Build)?;

        let session = Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                http,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                token: token.to_string(),
                gateway_override: config.gateway_url.clone(),
                intents: config.intents,
                max_rest_retries: config.max_rest_retries,
                backoff,
            }),
        };

        tracing::info!(
            session_id = %session.inner.id,
            api_base = %session.inner.api_base,
            max_rest_retries = config.max_rest_retries,
            "Client session created"
        );

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn intents(&self) -> u64 {
        self.inner.intents
    }

    pub fn max_rest_retries(&self) -> u32 {
        self.inner.max_rest_retries
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.api_base, path.trim_start_matches('/'))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> SessionResult<T> {
        let url = self.endpoint(path);
        let mut attempt = 0u32;

        loop {
            let mut request = self.inner.http.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(SessionError::Decode);
                }
                Ok(response) => {
                    let status = response.status();
                    if attempt < self.inner.max_rest_retries && is_retryable_status(status) {
                        attempt += 1;
                        let delay = retry_after(&response)
                            .map(|d| d.min(self.inner.backoff.max_delay()))
                            .unwrap_or_else(|| self.inner.backoff.delay(attempt));
                        tracing::warn!(%method, path, %status, attempt, delay = ?delay, "Retrying REST request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(SessionError::Status { status, body });
                }
                Err(e) => {
                    if attempt < self.inner.max_rest_retries && is_retryable_error(&e) {
                        attempt += 1;
                        let delay = self.inner.backoff.delay(attempt);
                        tracing::warn!(%method, path, error = %e, attempt, delay = ?delay, "Retrying REST request after transport error");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SessionError::Http(e));
                }
            }
        }
    }

    /// Guilds the bot user is a member of.
    pub async fn current_user_guilds(&self) -> SessionResult<Vec<Guild>> {
        self.request(Method::GET, "users/@me/guilds", None).await
    }

    /// Gateway URL, from configuration if overridden, otherwise from the API.
    pub async fn gateway_url(&self) -> SessionResult<String> {
        if let Some(url) = &self.inner.gateway_override {
            return Ok(url.clone());
        }
        let info: GatewayInfo = self.request(Method::GET, "gateway/bot", None).await?;
        Ok(info.url)
    }

    /// Post a plain text message to a channel.
    pub async fn send_message(&self, channel_id: &str, content: &str) -> SessionResult<()> {
        let body = json!({ "content": content });
        let _: IgnoredAny = self
            .request(Method::POST, &format!("channels/{channel_id}/messages"), Some(&body))
            .await?;
        Ok(())
    }
}

/// Server-provided delay for 429 responses, in (possibly fractional) seconds.
///
/// Negative, non-finite and out-of-range values are ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("api_base", &self.inner.api_base)
            .field("max_rest_retries", &self.inner.max_rest_retries)
            .finish()
    }
}
