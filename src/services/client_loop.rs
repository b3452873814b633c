//! Gateway client loop.
//!
//! # Responsibilities
//! - Resolve the gateway URL and hold a WebSocket connection open
//! - Answer `HELLO` with `IDENTIFY` and keep heartbeating
//! - Fan dispatches out to plugin event handlers
//! - Route prefixed chat messages to commands and post their replies
//!
//! # Design Decisions
//! - Each dispatch runs in its own task; the read loop never awaits a handler
//! - The first heartbeat fires at a random point within one interval
//! - A missed heartbeat ACK is treated as a dead connection

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;

use super::{Service, ServiceError};
use crate::observability::metrics;
use crate::plugin::{Event, Hooks};
use crate::resilience::Backoff;
use crate::session::gateway::{self, opcode};
use crate::session::{GatewayPayload, MessageCreate};
use crate::state::SharedState;

/// Why a healthy connection ended.
#[derive(Debug, PartialEq, Eq)]
enum Disconnect {
    /// The gateway asked for a fresh connection.
    Reconnect,
}

/// Keeps the bot connected to the chat gateway.
pub struct ClientLoop {
    hooks: Arc<Hooks>,
}

impl ClientLoop {
    pub fn new(hooks: Arc<Hooks>) -> Self {
        Self { hooks }
    }
}

#[async_trait]
impl Service for ClientLoop {
    fn name(&self) -> &'static str {
        "bot"
    }

    async fn run(self: Box<Self>, state: SharedState) -> Result<(), ServiceError> {
        let backoff = Backoff::from(&state.config().retries);
        let mut failures = 0u32;

        loop {
            match connect_once(&state, &self.hooks).await {
                Ok(Disconnect::Reconnect) => {
                    failures = 0;
                    tracing::info!("Gateway requested reconnect");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(error = %e, attempt = failures, "Gateway connection lost");
                }
            }

            let delay = backoff.delay(failures.max(1));
            tracing::debug!(delay = ?delay, "Reconnecting to gateway");
            time::sleep(delay).await;
        }
    }
}

async fn connect_once(state: &SharedState, hooks: &Arc<Hooks>) -> Result<Disconnect, ServiceError> {
    let session = state.session();
    let url = gateway::connect_url(&session.gateway_url().await?);
    let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    tracing::info!(url = %url, "Gateway connected");

    let (mut sink, mut stream) = socket.split();

    let hello = loop {
        match stream.next().await {
            Some(message) => {
                if let Some(payload) = decode(message?)? {
                    break payload;
                }
            }
            None => return Err(ServiceError::Closed("closed before HELLO".into())),
        }
    };
    let interval_ms = hello
        .heartbeat_interval_ms()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| ServiceError::Protocol(format!("expected HELLO, got opcode {}", hello.op)))?;

    send(&mut sink, &GatewayPayload::identify(session.token(), session.intents())).await?;

    let interval = Duration::from_millis(interval_ms);
    let first = Duration::from_millis((interval_ms as f64 * fastrand::f64()) as u64);
    let mut heartbeat = time::interval_at(Instant::now() + first, interval);
    let mut sequence: Option<u64> = None;
    let mut awaiting_ack = false;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if awaiting_ack {
                    return Err(ServiceError::Protocol("heartbeat not acknowledged".into()));
                }
                send(&mut sink, &GatewayPayload::heartbeat(sequence)).await?;
                awaiting_ack = true;
            }
            message = stream.next() => {
                let Some(message) = message else {
                    return Err(ServiceError::Closed("stream ended".into()));
                };
                let Some(payload) = decode(message?)? else {
                    continue;
                };
                if payload.s.is_some() {
                    sequence = payload.s;
                }

                match payload.op {
                    opcode::DISPATCH => spawn_dispatch(state, hooks, payload),
                    opcode::HEARTBEAT => send(&mut sink, &GatewayPayload::heartbeat(sequence)).await?,
                    opcode::HEARTBEAT_ACK => awaiting_ack = false,
                    opcode::RECONNECT => return Ok(Disconnect::Reconnect),
                    opcode::INVALID_SESSION => {
                        return Err(ServiceError::Protocol("session invalidated".into()));
                    }
                    other => tracing::debug!(op = other, "Ignoring gateway frame"),
                }
            }
        }
    }
}

/// Decode a text frame. Control and binary frames yield `None`.
fn decode(message: Message) -> Result<Option<GatewayPayload>, ServiceError> {
    match message {
        Message::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
        Message::Close(frame) => Err(ServiceError::Closed(
            frame.map(|f| format!("{} {}", f.code, f.reason)).unwrap_or_default(),
        )),
        _ => Ok(None),
    }
}

async fn send<S>(sink: &mut S, payload: &GatewayPayload) -> Result<(), ServiceError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(payload)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

fn spawn_dispatch(state: &SharedState, hooks: &Arc<Hooks>, payload: GatewayPayload) {
    let Some(name) = payload.t else {
        tracing::debug!("Dispatch without event name");
        return;
    };
    metrics::record_gateway_event(&name);

    let state = state.clone();
    let hooks = hooks.clone();
    tokio::spawn(async move {
        handle_dispatch(&state, &hooks, name, payload.d).await;
    });
}

async fn handle_dispatch(state: &SharedState, hooks: &Arc<Hooks>, name: String, data: Value) {
    if name == "MESSAGE_CREATE" {
        match serde_json::from_value::<MessageCreate>(data.clone()) {
            Ok(message) => route_command(state, hooks, message).await,
            Err(e) => tracing::warn!(error = %e, "Malformed MESSAGE_CREATE"),
        }
    }

    let handled = hooks.dispatch_event(state, Event { name, data }).await;
    tracing::trace!(handled, "Dispatch handled");
}

async fn route_command(state: &SharedState, hooks: &Arc<Hooks>, message: MessageCreate) {
    let channel_id = message.channel_id.clone();
    match hooks.handle_message(state, message).await {
        Ok(Some(reply)) => {
            if let Err(e) = state.session().send_message(&channel_id, &reply).await {
                tracing::warn!(channel_id = %channel_id, error = %e, "Failed to send command reply");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(channel_id = %channel_id, error = %e, "Command failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn test_decode_text_frame() {
        let payload = decode(Message::Text(r#"{"op":11}"#.into())).unwrap().unwrap();
        assert_eq!(payload.op, opcode::HEARTBEAT_ACK);
    }

    #[test]
    fn test_decode_skips_control_frames() {
        assert!(decode(Message::Ping(Vec::new().into())).unwrap().is_none());
    }

    #[test]
    fn test_decode_close_frame() {
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: "bad token".into(),
        };
        let err = decode(Message::Close(Some(frame))).unwrap_err();
        assert!(matches!(err, ServiceError::Closed(reason) if reason.contains("bad token")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(Message::Text("not json".into())),
            Err(ServiceError::Decode(_))
        ));
    }
}
