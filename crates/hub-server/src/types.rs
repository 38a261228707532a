//! Shared types for the hub server.
//!
//! This module defines:
//! - mailbox channel aliases (hub loop -> writer task)
//! - `Outlet`: what the hub holds to reach one connection
//! - `Client`: the hub-side half of one connection
//! - `HubCommand`: events flowing into the hub loop

use std::sync::atomic::{AtomicU64, Ordering};

use hub_core::{ConnectionId, DirectMessage, Identity, OutboundFrame, UserId};
use tokio::sync::{mpsc, oneshot};

/// Outbound frames from the hub loop to one client's writer task.
///
/// The hub loop holds the only sender, so dropping the registry entry is
/// what closes the mailbox.
pub type MailboxTx = mpsc::Sender<OutboundFrame>;
pub type MailboxRx = mpsc::Receiver<OutboundFrame>;

/// Resolves once the hub has dropped the connection's registry entry.
pub type HangupRx = oneshot::Receiver<()>;

/// Hub-side end of one connection: its mailbox sender plus a hang-up line.
///
/// Dropping an `Outlet` closes the mailbox and resolves the matching
/// [`HangupRx`]. Eviction and replacement rely on this to close the
/// socket, not just the mailbox.
#[derive(Debug)]
pub struct Outlet {
    pub frames: MailboxTx,
    _hangup: oneshot::Sender<()>,
}

impl Outlet {
    pub fn new(capacity: usize) -> (Outlet, MailboxRx, HangupRx) {
        let (frames, mailbox) = mpsc::channel(capacity);
        let (hangup_tx, hangup_rx) = oneshot::channel();
        let outlet = Outlet {
            frames,
            _hangup: hangup_tx,
        };
        (outlet, mailbox, hangup_rx)
    }
}

/// Channel from connection tasks -> hub loop.
pub type HubTx = mpsc::Sender<HubCommand>;
pub type HubRx = mpsc::Receiver<HubCommand>;

/// What the hub loop stores for a connection.
#[derive(Debug)]
pub struct Client {
    pub conn_id: ConnectionId,
    pub identity: Identity,
    pub mailbox: Outlet,
}

/// Event processed by the hub loop, strictly one at a time.
#[derive(Debug)]
pub enum HubCommand {
    /// Insert (or replace) the client for `identity.user_id`.
    Register(Client),

    /// Remove `user_id` if it is still served by `conn_id`.
    Unregister {
        conn_id: ConnectionId,
        user_id: UserId,
    },

    /// Deliver a stamped message to its receiver, if online.
    Route(DirectMessage),

    /// Snapshot of everyone currently registered.
    Online { reply: oneshot::Sender<Vec<Identity>> },

    /// Number of registered clients.
    Count { reply: oneshot::Sender<usize> },
}

/// Global-ish counter for assigning unique `ConnectionId`s.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}
