// crates/hub-protocol/src/json_codec.rs

//! JSON codec.
//!
//! Converts between text frames and `hub_core` messages:
//!
//! - inbound (client -> hub): `{"receiver_id": int, "content": string}`
//! - outbound direct:         the raw content, or with [`DirectFormat::Envelope`]
//!                            the full stamped message (RFC 3339 timestamp)
//! - outbound presence:       `{"type": "status", "data": {...}}`
//!
//! Decoding is strict about the fields the hub needs and lenient about
//! everything else. A decode failure is fatal to the connection that sent
//! the frame, never to the hub.

use std::fmt;
use std::str::FromStr;

use hub_core::{DirectMessage, InboundMessage, OutboundFrame, PresenceEvent, UserId};
use thiserror::Error;

use crate::wire_types::{WireDirect, WireEvent, WireInbound, WireOutbound, WireStatus};

/// Errors that can arise when encoding/decoding a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not JSON, or JSON that does not match the expected schema.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Serialization of an in-memory value failed.
    #[error("could not encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// How a direct message is written to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectFormat {
    /// The message content as-is. The receiver learns nothing else.
    #[default]
    Raw,

    /// `{"sender_id", "sender_name", "receiver_id", "content", "timestamp"}`.
    Envelope,
}

impl FromStr for DirectFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(DirectFormat::Raw),
            "envelope" => Ok(DirectFormat::Envelope),
            other => Err(format!("unknown direct format: {other}")),
        }
    }
}

impl fmt::Display for DirectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectFormat::Raw => write!(f, "raw"),
            DirectFormat::Envelope => write!(f, "envelope"),
        }
    }
}

/// Decode a client text frame.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, FrameError> {
    let wire: WireInbound = serde_json::from_str(text).map_err(FrameError::Malformed)?;
    Ok(inbound_from_wire(wire))
}

/// Decode a client binary frame; the payload must be UTF-8 JSON.
pub fn decode_inbound_slice(bytes: &[u8]) -> Result<InboundMessage, FrameError> {
    let wire: WireInbound = serde_json::from_slice(bytes).map_err(FrameError::Malformed)?;
    Ok(inbound_from_wire(wire))
}

/// Encode a client frame. Used by clients and tests.
pub fn encode_inbound(msg: &InboundMessage) -> Result<String, FrameError> {
    let wire = WireInbound {
        receiver_id: msg.receiver_id.0,
        content: msg.content.clone(),
    };
    serde_json::to_string(&wire).map_err(FrameError::Encode)
}

/// Encode anything queued on a mailbox.
pub fn encode_outbound(frame: &OutboundFrame, format: DirectFormat) -> Result<String, FrameError> {
    let wire = match (frame, format) {
        (OutboundFrame::Direct(msg), DirectFormat::Raw) => return Ok(msg.content.clone()),
        (OutboundFrame::Direct(msg), DirectFormat::Envelope) => {
            WireOutbound::Direct(direct_to_wire(msg))
        }
        (OutboundFrame::Presence(event), _) => WireOutbound::Event(presence_to_wire(event)),
    };
    serde_json::to_string(&wire).map_err(FrameError::Encode)
}

/// Decode a status event or an enveloped direct message. Used by clients
/// and tests.
///
/// Raw direct messages are arbitrary text; a client that gets an error
/// here should treat the frame as message content.
pub fn decode_outbound(text: &str) -> Result<OutboundFrame, FrameError> {
    let wire: WireOutbound = serde_json::from_str(text).map_err(FrameError::Malformed)?;

    let frame = match wire {
        WireOutbound::Direct(d) => OutboundFrame::Direct(DirectMessage {
            sender_id: UserId(d.sender_id),
            sender_name: d.sender_name,
            receiver_id: UserId(d.receiver_id),
            content: d.content,
            timestamp: d.timestamp,
        }),
        WireOutbound::Event(WireEvent::Status(s)) => OutboundFrame::Presence(PresenceEvent {
            user_id: UserId(s.user_id),
            display_name: s.username,
            online: s.online,
        }),
    };

    Ok(frame)
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn inbound_from_wire(wire: WireInbound) -> InboundMessage {
    InboundMessage {
        receiver_id: UserId(wire.receiver_id),
        content: wire.content,
    }
}

fn direct_to_wire(msg: &DirectMessage) -> WireDirect {
    WireDirect {
        sender_id: msg.sender_id.0,
        sender_name: msg.sender_name.clone(),
        receiver_id: msg.receiver_id.0,
        content: msg.content.clone(),
        timestamp: msg.timestamp,
    }
}

fn presence_to_wire(event: &PresenceEvent) -> WireEvent {
    WireEvent::Status(WireStatus {
        user_id: event.user_id.0,
        username: event.display_name.clone(),
        online: event.online,
    })
}
