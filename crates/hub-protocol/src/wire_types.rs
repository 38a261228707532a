//! Serde shapes of the JSON frames.
//!
//! ```text
//! client -> hub   {"receiver_id": 2, "content": "hi"}
//! hub -> client   hi                                       (direct, raw)
//! hub -> client   {"sender_id": 1, "sender_name": "alice", "receiver_id": 2,
//!                  "content": "hi", "timestamp": "2024-01-01T00:00:00Z"}  (direct, envelope)
//! hub -> client   {"type": "status", "data": {"user_id": 1, "username": "alice", "online": true}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-to-hub frame.
///
/// Unknown fields are ignored rather than rejected, which is how
/// client-supplied `sender_id` / `sender_name` get discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInbound {
    pub receiver_id: i64,
    pub content: String,
}

/// Hub-to-client direct message, when sent as an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDirect {
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Typed hub-to-client event, tagged as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WireEvent {
    Status(WireStatus),
}

/// Payload of a `status` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStatus {
    pub user_id: i64,
    pub username: String,
    pub online: bool,
}

/// Anything the hub may send. Events are tried first since they carry
/// the `type` tag; everything else must be a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireOutbound {
    Event(WireEvent),
    Direct(WireDirect),
}
