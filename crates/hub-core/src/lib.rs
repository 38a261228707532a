//! hub-core
//!
//! Pure hub logic:
//! - identities handed over by the authenticating collaborator
//! - routed direct messages and presence events
//! - the `user_id -> connection` registry

pub mod identity;
pub mod messages;
pub mod registry;

pub use identity::{ConnectionId, Identity, UserId};

pub use messages::{
    DirectMessage,
    InboundMessage,
    OutboundFrame,
    PresenceEvent,
};

pub use registry::{Entry, Registry, RouteOutcome};
