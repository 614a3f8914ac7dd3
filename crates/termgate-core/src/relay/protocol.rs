//! JSON control messages
//!
//! Peer to server: `{"type":"resize","cols":N,"rows":N}` and `{"type":"ping"}`.
//! Server to peer: `ready`, `pong` and `error`.

use serde::Serialize;
use serde_json::Value;

/// Width used when a resize omits `cols`
pub const DEFAULT_COLS: i64 = 80;
/// Height used when a resize omits `rows`
pub const DEFAULT_ROWS: i64 = 24;

/// Control message sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerControl {
    /// Shell is running, relay is about to start
    Ready {
        /// Project id
        project_id: String,
        /// Project path relative to the dev root
        path: String,
        /// Verified username
        username: String,
    },
    /// Answer to a ping
    Pong,
    /// Something went wrong
    Error {
        /// Human readable message
        message: String,
    },
}

impl ServerControl {
    /// Error message
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// JSON text frame for this message
    #[must_use]
    pub fn to_json(&self) -> String {
        // plain string fields only, serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Control message sent by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientControl {
    /// Window size change (unclamped)
    Resize {
        /// Requested columns
        cols: i64,
        /// Requested rows
        rows: i64,
    },
    /// Keepalive
    Ping,
}

/// Parse a text frame, `None` for anything unparsable or unknown
#[must_use]
pub fn parse_client_control(text: &str) -> Option<ClientControl> {
    let payload: Value = serde_json::from_str(text).ok()?;
    match payload.get("type")?.as_str()? {
        "resize" => Some(ClientControl::Resize {
            cols: coerce_dimension(payload.get("cols"), DEFAULT_COLS)?,
            rows: coerce_dimension(payload.get("rows"), DEFAULT_ROWS)?,
        }),
        "ping" => Some(ClientControl::Ping),
        _ => None,
    }
}

/// Integer coercion for resize fields
///
/// Missing fields take the default, numbers truncate toward zero, numeric
/// strings parse, booleans count as 0/1. Anything else is invalid.
fn coerce_dimension(value: Option<&Value>, default: i64) -> Option<i64> {
    match value {
        None => Some(default),
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Bool(b)) => Some(i64::from(*b)),
        Some(_) => None,
    }
}
