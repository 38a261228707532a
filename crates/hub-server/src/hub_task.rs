//! Central hub loop.
//!
//! This task owns the `Registry` and processes every `HubCommand` coming
//! from connection tasks, one at a time, in receipt order. Nothing else
//! touches the registry; reads from outside (online list, count) are
//! commands too, answered over a oneshot.
//!
//! Routing policy:
//! - `Route`: unicast to the receiver's mailbox, or dropped if offline.
//! - `Register` / `Unregister`: presence broadcast to **all other**
//!   registered clients.
//!
//! Mailbox delivery never waits. A full mailbox is handled according to
//! the configured [`OverflowPolicy`].
//!
//! Whenever an entry leaves the registry (unregister, eviction or
//! replacement) its `Outlet` is dropped, which closes the mailbox and
//! hangs up the connection.

use std::time::Duration;

use hub_core::{
    ConnectionId, DirectMessage, Entry, Identity, OutboundFrame, PresenceEvent, Registry,
    RouteOutcome, UserId,
};
use hub_protocol::DirectFormat;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::config::{HubConfig, OverflowPolicy};
use crate::connection;
use crate::error::{HubError, HubResult};
use crate::types::{
    next_connection_id, Client, HangupRx, HubCommand, HubRx, HubTx, MailboxRx, Outlet,
};

/// Run the central hub processing loop until every `HubHandle` is dropped.
pub async fn run_hub_loop(mut hub_rx: HubRx, overflow: OverflowPolicy) {
    let mut hub = HubLoop::new(overflow);

    while let Some(cmd) = hub_rx.recv().await {
        hub.handle(cmd);
    }

    info!(
        remaining = hub.registry.len(),
        "hub loop shutting down (hub_rx closed)"
    );
}

enum Delivery {
    Queued,
    Full,
    Closed,
}

fn deliver(entry: &Entry<Outlet>, frame: OutboundFrame) -> Delivery {
    match entry.mailbox.frames.try_send(frame) {
        Ok(()) => Delivery::Queued,
        Err(TrySendError::Full(_)) => Delivery::Full,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

/// Registry plus the routing rules applied to it.
struct HubLoop {
    registry: Registry<Outlet>,
    overflow: OverflowPolicy,
}

impl HubLoop {
    fn new(overflow: OverflowPolicy) -> Self {
        HubLoop {
            registry: Registry::new(),
            overflow,
        }
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(client) => self.register(client),
            HubCommand::Unregister { conn_id, user_id } => self.unregister(conn_id, user_id),
            HubCommand::Route(msg) => {
                self.route(msg);
            }
            HubCommand::Online { reply } => {
                let _ = reply.send(self.registry.identities());
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    fn register(&mut self, client: Client) {
        let Client {
            conn_id,
            identity,
            mailbox,
        } = client;
        let user_id = identity.user_id;
        let event = PresenceEvent::online(&identity);

        // Dropping the replaced entry closes its mailbox and hangs up the
        // old connection.
        if let Some(replaced) = self.registry.register(conn_id, identity, mailbox) {
            info!(
                %user_id,
                old_conn = %replaced.conn_id,
                new_conn = %conn_id,
                "connection replaced"
            );
        }

        debug!(%user_id, %conn_id, online = self.registry.len(), "client registered");
        self.notify_presence(event);
    }

    fn unregister(&mut self, conn_id: ConnectionId, user_id: UserId) {
        match self.registry.unregister(conn_id, user_id) {
            Some(entry) => {
                debug!(%user_id, %conn_id, online = self.registry.len(), "client unregistered");
                let event = PresenceEvent::offline(&entry.identity);
                drop(entry);
                self.notify_presence(event);
            }
            None => {
                debug!(%user_id, %conn_id, "unregister ignored (replaced or already removed)");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------------

    fn route(&mut self, msg: DirectMessage) -> RouteOutcome {
        let receiver_id = msg.receiver_id;
        let sender_id = msg.sender_id;

        let Some(entry) = self.registry.get(receiver_id) else {
            debug!(%sender_id, %receiver_id, "receiver offline, message dropped");
            return RouteOutcome::Miss;
        };

        match deliver(entry, msg.into()) {
            Delivery::Queued => RouteOutcome::Delivered,
            Delivery::Closed => {
                debug!(%sender_id, %receiver_id, "receiver mailbox closed, message dropped");
                RouteOutcome::Miss
            }
            Delivery::Full => match self.overflow {
                OverflowPolicy::DropNewest => {
                    warn!(%sender_id, %receiver_id, "receiver mailbox full, message dropped");
                    RouteOutcome::Dropped
                }
                OverflowPolicy::Disconnect => {
                    self.evict_slow(vec![receiver_id]);
                    RouteOutcome::Evicted
                }
            },
        }
    }

    // -------------------------------------------------------------------------
    // Presence
    // -------------------------------------------------------------------------

    fn notify_presence(&mut self, event: PresenceEvent) {
        let slow = self.fan_out(&event);
        self.evict_slow(slow);
    }

    /// Queue `event` for everyone except its subject. Returns receivers
    /// that have to be disconnected under the current policy.
    fn fan_out(&self, event: &PresenceEvent) -> Vec<UserId> {
        let mut slow = Vec::new();

        for entry in self.registry.others(event.user_id) {
            match deliver(entry, OutboundFrame::Presence(event.clone())) {
                Delivery::Queued | Delivery::Closed => {}
                Delivery::Full => match self.overflow {
                    OverflowPolicy::DropNewest => {
                        warn!(
                            receiver_id = %entry.identity.user_id,
                            subject = %event.user_id,
                            "receiver mailbox full, presence event dropped"
                        );
                    }
                    OverflowPolicy::Disconnect => slow.push(entry.identity.user_id),
                },
            }
        }

        slow
    }

    /// Disconnect slow receivers. Each eviction is itself announced as
    /// presence-offline, which may find further full mailboxes.
    fn evict_slow(&mut self, mut slow: Vec<UserId>) {
        while let Some(user_id) = slow.pop() {
            let Some(entry) = self.registry.evict(user_id) else {
                continue;
            };

            warn!(
                %user_id,
                conn_id = %entry.conn_id,
                "mailbox full, disconnecting slow receiver"
            );

            let event = PresenceEvent::offline(&entry.identity);
            drop(entry);
            slow.extend(self.fan_out(&event));
        }
    }
}

// -----------------------------------------------------------------------------
// Handle
// -----------------------------------------------------------------------------

/// Connection-side ends of a fresh registration.
#[derive(Debug)]
pub struct Registration {
    pub conn_id: ConnectionId,
    pub mailbox: MailboxRx,

    /// Resolves when the hub drops this registration's entry.
    pub hangup: HangupRx,
}

/// Cloneable front door to the hub loop.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: HubTx,
    mailbox_capacity: usize,
    direct_format: DirectFormat,
    drain_timeout: Duration,
}

impl HubHandle {
    /// Spawn the hub loop and return a handle to it.
    ///
    /// The loop stops once the handle and all its clones are dropped.
    pub fn spawn(config: &HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_capacity);
        let task = tokio::spawn(run_hub_loop(rx, config.overflow));

        let handle = HubHandle {
            tx,
            mailbox_capacity: config.mailbox_capacity,
            direct_format: config.direct_format,
            drain_timeout: config.drain_timeout,
        };
        (handle, task)
    }

    /// Create a Client for an upgraded connection, register it and start
    /// its reader / writer tasks.
    pub async fn establish<S>(
        &self,
        identity: Identity,
        ws: WebSocketStream<S>,
    ) -> HubResult<ConnectionId>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let registration = self.register(identity.clone()).await?;
        let conn_id = registration.conn_id;

        info!(
            user_id = %identity.user_id,
            name = %identity.display_name,
            %conn_id,
            "connection established"
        );

        tokio::spawn(connection::run_connection(
            identity,
            ws,
            registration,
            self.clone(),
        ));

        Ok(conn_id)
    }

    /// Register `identity` with a new, empty mailbox.
    pub async fn register(&self, identity: Identity) -> HubResult<Registration> {
        let conn_id = next_connection_id();
        let (outlet, mailbox, hangup) = Outlet::new(self.mailbox_capacity);

        self.send(HubCommand::Register(Client {
            conn_id,
            identity,
            mailbox: outlet,
        }))
        .await?;

        Ok(Registration {
            conn_id,
            mailbox,
            hangup,
        })
    }

    pub(crate) fn direct_format(&self) -> DirectFormat {
        self.direct_format
    }

    /// How long a hung-up writer may keep flushing before it is aborted.
    pub(crate) fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub async fn unregister(&self, conn_id: ConnectionId, user_id: UserId) -> HubResult<()> {
        self.send(HubCommand::Unregister { conn_id, user_id }).await
    }

    /// Unregister without awaiting; used from `Drop`.
    pub(crate) fn unregister_detached(&self, conn_id: ConnectionId, user_id: UserId) {
        match self.tx.try_send(HubCommand::Unregister { conn_id, user_id }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(cmd)) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let tx = self.tx.clone();
                    runtime.spawn(async move {
                        let _ = tx.send(cmd).await;
                    });
                }
                Err(_) => {
                    warn!(%user_id, %conn_id, "no runtime left, unregister dropped");
                }
            },
        }
    }

    pub async fn route(&self, msg: DirectMessage) -> HubResult<()> {
        self.send(HubCommand::Route(msg)).await
    }

    /// Everyone currently registered, ordered by user id.
    pub async fn online(&self) -> HubResult<Vec<Identity>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Online { reply }).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    pub async fn online_count(&self) -> HubResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Count { reply }).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    async fn send(&self, cmd: HubCommand) -> HubResult<()> {
        self.tx.send(cmd).await.map_err(|_| HubError::HubClosed)
    }
}
