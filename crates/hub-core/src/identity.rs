//! Identity types.
//!
//! The hub never authenticates anyone itself. An external collaborator
//! resolves the caller to an [`Identity`] before the connection reaches
//! the hub, and that value stays fixed for the connection's lifetime.

use std::fmt;

/// Numeric user identifier, as issued by the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An already-authenticated user: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Identity {
            user_id: UserId(user_id),
            display_name: display_name.into(),
        }
    }
}

/// Identifier for one live connection.
///
/// Distinct from [`UserId`]: the same user can reconnect, and the
/// registry must tell the old connection apart from its replacement.
/// Uniqueness is only guaranteed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
