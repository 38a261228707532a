// crates/hub-server/src/connection.rs

//! Per-connection task group.
//!
//! Each upgraded WebSocket gets:
//! - a writer task that drains the mailbox into the sink,
//! - a reader loop (run inline) that decodes frames and submits routes,
//! - a supervisor (this function) that waits for whichever comes first:
//!   the reader stops, the writer stops, or the hub hangs up (eviction or
//!   replacement), and then unregisters exactly once.
//!
//! Teardown always converges to the same state: the reader is dropped, the
//! registry entry is gone (which closes the mailbox), and the writer drains
//! what was queued, closes the sink and exits. A writer that cannot finish
//! within the drain timeout is aborted, which drops the transport.

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hub_core::{ConnectionId, Identity, UserId};
use hub_protocol::json_codec;
use hub_protocol::DirectFormat;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::error::{HubError, HubResult};
use crate::hub_task::{HubHandle, Registration};
use crate::types::MailboxRx;

/// Run the reader / writer pair for a single registered connection.
pub(crate) async fn run_connection<S>(
    identity: Identity,
    ws: WebSocketStream<S>,
    registration: Registration,
    hub: HubHandle,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Registration {
        conn_id,
        mailbox,
        mut hangup,
    } = registration;
    let user_id = identity.user_id;
    let guard = UnregisterGuard::new(hub.clone(), conn_id, user_id);

    let (sink, stream) = ws.split();
    let mut writer = tokio::spawn(write_loop(conn_id, sink, mailbox, hub.direct_format()));

    let mut reader = Box::pin(read_loop(conn_id, &identity, stream, &hub));

    // Hang-up is checked first so nothing more is read once the hub has
    // dropped this connection.
    let writer_done = tokio::select! {
        biased;
        _ = &mut hangup => {
            info!(%user_id, %conn_id, "hub closed the connection");
            false
        }
        res = &mut reader => {
            match res {
                Ok(()) => info!(%user_id, %conn_id, "client disconnected"),
                Err(e) => warn!(%user_id, %conn_id, error = %e, "reader stopped"),
            }
            false
        }
        res = &mut writer => {
            match res {
                Ok(Ok(())) => debug!(%user_id, %conn_id, "writer finished (mailbox closed)"),
                Ok(Err(e)) => warn!(%user_id, %conn_id, error = %e, "writer stopped"),
                Err(e) => warn!(%user_id, %conn_id, error = %e, "writer task failed"),
            }
            true
        }
    };

    drop(reader);
    guard.release().await;

    if !writer_done {
        // Unregister closes the mailbox; let the writer flush and close.
        match timeout(hub.drain_timeout(), &mut writer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => debug!(%user_id, %conn_id, error = %e, "writer ended with error"),
            Ok(Err(e)) => warn!(%user_id, %conn_id, error = %e, "writer task failed"),
            Err(_) => {
                warn!(%user_id, %conn_id, "writer did not drain in time, aborting");
                writer.abort();
                let _ = writer.await;
            }
        }
    }

    debug!(%user_id, %conn_id, "connection torn down");
}

/// Decode inbound frames and submit them as routes until the peer goes
/// away or sends something undecodable.
async fn read_loop<S>(
    conn_id: ConnectionId,
    identity: &Identity,
    mut stream: SplitStream<WebSocketStream<S>>,
    hub: &HubHandle,
) -> HubResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = stream.next().await {
        let inbound = match msg? {
            Message::Text(text) => json_codec::decode_inbound(&text)?,
            Message::Binary(data) => json_codec::decode_inbound_slice(&data)?,
            Message::Close(frame) => {
                debug!(%conn_id, reason = ?frame, "client initiated close");
                return Ok(());
            }
            // Ping replies are queued by tungstenite itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        let msg = inbound.stamp(identity, Utc::now());
        debug!(
            %conn_id,
            sender_id = %msg.sender_id,
            receiver_id = %msg.receiver_id,
            "route"
        );
        hub.route(msg).await?;
    }

    Ok(())
}

/// Drain the mailbox into the sink. The sink is closed exactly once, on
/// every exit path.
async fn write_loop<S>(
    conn_id: ConnectionId,
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut mailbox: MailboxRx,
    format: DirectFormat,
) -> HubResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = async {
        while let Some(frame) = mailbox.recv().await {
            let text = json_codec::encode_outbound(&frame, format)?;
            sink.send(Message::Text(text)).await?;
        }
        Ok::<(), HubError>(())
    }
    .await;

    if let Err(e) = sink.close().await {
        debug!(%conn_id, error = %e, "close after writer exit failed");
    }

    result
}

/// Submits the connection's unregister exactly once: explicitly through
/// `release`, or from `Drop` if the supervisor unwinds first.
struct UnregisterGuard {
    hub: Option<HubHandle>,
    conn_id: ConnectionId,
    user_id: UserId,
}

impl UnregisterGuard {
    fn new(hub: HubHandle, conn_id: ConnectionId, user_id: UserId) -> Self {
        UnregisterGuard {
            hub: Some(hub),
            conn_id,
            user_id,
        }
    }

    async fn release(mut self) {
        if let Some(hub) = self.hub.take() {
            if hub.unregister(self.conn_id, self.user_id).await.is_err() {
                debug!(conn_id = %self.conn_id, "hub loop gone before unregister");
            }
        }
    }
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.unregister_detached(self.conn_id, self.user_id);
        }
    }
}
