//! Gateway payload framing.
//!
//! Every frame is a JSON object `{op, d, s, t}`. Only the opcodes the client
//! loop acts on are named here.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// One gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: opcode::HEARTBEAT,
            d: json!(sequence),
            s: None,
            t: None,
        }
    }

    pub fn identify(token: &str, intents: u64) -> Self {
        Self {
            op: opcode::IDENTIFY,
            d: json!({
                "token": token,
                "intents": intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "guildbot",
                    "device": "guildbot",
                },
            }),
            s: None,
            t: None,
        }
    }

    /// Heartbeat interval carried by a `HELLO` frame.
    pub fn heartbeat_interval_ms(&self) -> Option<u64> {
        if self.op != opcode::HELLO {
            return None;
        }
        self.d.get("heartbeat_interval").and_then(Value::as_u64)
    }
}

/// Append the query parameters the gateway expects.
pub fn connect_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.contains('?') {
        base.to_string()
    } else {
        format!("{base}/?v=10&encoding=json")
    }
}
