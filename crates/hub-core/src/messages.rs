//! Message types that flow through the hub.
//!
//! These are **transport-agnostic** logical messages:
//! - [`InboundMessage`]: what a client asks the hub to deliver.
//! - [`DirectMessage`]: an inbound message after the server stamped it.
//! - [`PresenceEvent`]: connect / disconnect notification.
//! - [`OutboundFrame`]: anything queued onto a client's mailbox.
//!
//! Note: JSON encoders live in the `hub-protocol` crate;
//! this module is purely logical.

use chrono::{DateTime, Utc};

use crate::identity::{Identity, UserId};

/// A client's request to deliver `content` to `receiver_id`.
///
/// Carries no sender information on purpose: whatever the client put
/// on the wire about itself is discarded by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub receiver_id: UserId,
    pub content: String,
}

impl InboundMessage {
    pub fn new(receiver_id: i64, content: impl Into<String>) -> Self {
        InboundMessage {
            receiver_id: UserId(receiver_id),
            content: content.into(),
        }
    }

    /// Attach the sending connection's identity and the receipt time.
    pub fn stamp(self, sender: &Identity, timestamp: DateTime<Utc>) -> DirectMessage {
        DirectMessage {
            sender_id: sender.user_id,
            sender_name: sender.display_name.clone(),
            receiver_id: self.receiver_id,
            content: self.content,
            timestamp,
        }
    }
}

/// A routed point-to-point message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    /// Always taken from the sending connection, never from the wire.
    pub sender_id: UserId,
    pub sender_name: String,

    pub receiver_id: UserId,
    pub content: String,

    /// Time the hub received the frame.
    pub timestamp: DateTime<Utc>,
}

/// Presence change for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub display_name: String,
    pub online: bool,
}

impl PresenceEvent {
    pub fn online(identity: &Identity) -> Self {
        PresenceEvent {
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            online: true,
        }
    }

    pub fn offline(identity: &Identity) -> Self {
        PresenceEvent {
            online: false,
            ..PresenceEvent::online(identity)
        }
    }
}

/// One unit queued onto a client's mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A message addressed to this client.
    Direct(DirectMessage),

    /// Another user came online or went offline.
    Presence(PresenceEvent),
}

impl From<DirectMessage> for OutboundFrame {
    fn from(msg: DirectMessage) -> Self {
        OutboundFrame::Direct(msg)
    }
}

impl From<PresenceEvent> for OutboundFrame {
    fn from(event: PresenceEvent) -> Self {
        OutboundFrame::Presence(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_uses_sender_identity() {
        let alice = Identity::new(1, "alice");
        let now = Utc::now();

        let msg = InboundMessage::new(2, "hi").stamp(&alice, now);

        assert_eq!(msg.sender_id, UserId(1));
        assert_eq!(msg.sender_name, "alice");
        assert_eq!(msg.receiver_id, UserId(2));
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.timestamp, now);
    }

    #[test]
    fn offline_event_keeps_identity() {
        let bob = Identity::new(2, "bob");
        let event = PresenceEvent::offline(&bob);
        assert_eq!(event.user_id, UserId(2));
        assert_eq!(event.display_name, "bob");
        assert!(!event.online);
        assert!(PresenceEvent::online(&bob).online);
    }
}
