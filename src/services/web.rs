//! HTTP listener service.
//!
//! # Responsibilities
//! - Serve `/healthz` and `/api/status`
//! - Serve routes mounted by plugins
//! - Wire up middleware (tracing, timeout, request ID)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::{Service, ServiceError};
use crate::plugin::Hooks;
use crate::state::SharedState;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub plugins: Vec<&'static str>,
    pub commands: Vec<String>,
}

impl StatusResponse {
    pub fn from_hooks(hooks: &Hooks) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            plugins: hooks.plugins().to_vec(),
            commands: hooks.commands().map(|c| c.name.clone()).collect(),
        }
    }
}

/// Build the router with built-in routes, plugin routes and middleware.
pub fn build_router(hooks: &Hooks, request_timeout: Duration) -> Router {
    let status = Arc::new(StatusResponse::from_hooks(hooks));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(api_status))
        .with_state(status)
        .merge(hooks.router())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn healthz() -> &'static str {
    "ok"
}

async fn api_status(State(status): State<Arc<StatusResponse>>) -> Json<StatusResponse> {
    Json(status.as_ref().clone())
}

/// Serves the web surface on the configured listen address.
pub struct HttpListener {
    hooks: Arc<Hooks>,
}

impl HttpListener {
    pub fn new(hooks: Arc<Hooks>) -> Self {
        Self { hooks }
    }
}

#[async_trait]
impl Service for HttpListener {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(self: Box<Self>, state: SharedState) -> Result<(), ServiceError> {
        let web = &state.config().web;
        let router = build_router(&self.hooks, Duration::from_secs(web.request_timeout_secs));

        let listener = TcpListener::bind(&web.listen_address)
            .await
            .map_err(|source| ServiceError::Bind {
                address: web.listen_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServiceError::Serve)?;
        tracing::info!(address = %local_addr, "HTTP server starting");

        axum::serve(listener, router).await.map_err(ServiceError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins;
    use crate::state::testing::offline_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn router() -> Router {
        let hooks = plugins::builtin().attach_all(&offline_state().await).unwrap();
        build_router(&hooks, Duration::from_secs(5))
    }

    async fn get_json(router: Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_healthz_sets_request_id() {
        let response = router()
            .await
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = router()
            .await
            .oneshot(
                Request::get("/healthz")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_status_lists_plugins_and_commands() {
        let (status, body) = get_json(router().await, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["plugins"], serde_json::json!(["commands", "serverstats", "notifications"]));
        assert_eq!(body["commands"], serde_json::json!(["help", "ping", "stats"]));
    }

    #[tokio::test]
    async fn test_plugin_routes_are_served() {
        let (status, body) = get_json(router().await, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get_json(router().await, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = offline_state().await.config().clone();
        config.web.listen_address = taken.local_addr().unwrap().to_string();
        let base = offline_state().await;
        let state = SharedState::new(config, base.pool().clone(), base.session().clone());

        let hooks = Arc::new(plugins::builtin().attach_all(&state).unwrap());
        let err = Box::new(HttpListener::new(hooks)).run(state).await.unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }));
    }
}
