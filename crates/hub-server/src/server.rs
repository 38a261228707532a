//! WebSocket listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections, subject to `max_clients`.
//! - Performs the WebSocket upgrade, resolving the caller's identity
//!   from the upgrade request.
//! - Hands each upgraded connection to the hub (`HubHandle::establish`).
//!
//! The per-connection logic and the hub loop live in `connection` and
//! `hub_task` respectively.

use std::net::SocketAddr;
use std::sync::Arc;

use hub_core::{ConnectionId, Identity};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{HubError, HubResult};
use crate::hub_task::HubHandle;
use crate::identity::{IdentityProvider, TrustedHeaders};

/// Bind the configured address and serve with [`TrustedHeaders`].
pub async fn run(config: Config) -> HubResult<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, path = %config.ws_path, "listening");

    serve(listener, config, TrustedHeaders::default()).await
}

/// Accept connections on an already-bound listener forever.
pub async fn serve<P>(listener: TcpListener, config: Config, provider: P) -> HubResult<()>
where
    P: IdentityProvider,
{
    config.validate()?;

    let (hub, _hub_task) = HubHandle::spawn(&config.hub);
    let provider = Arc::new(provider);
    let ws_path: Arc<str> = Arc::from(config.ws_path.as_str());

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "accept failed; continuing");
                continue;
            }
        };

        let online = hub.online_count().await?;
        if online >= config.max_clients {
            warn!(
                peer = %peer_addr,
                max_clients = config.max_clients,
                "rejecting connection: max_clients reached"
            );
            // Just drop the stream; client will see the connection closed.
            continue;
        }

        let hub = hub.clone();
        let provider = Arc::clone(&provider);
        let ws_path = Arc::clone(&ws_path);

        tokio::spawn(async move {
            match accept_connection(stream, peer_addr, &hub, provider.as_ref(), &ws_path).await {
                Ok(conn_id) => debug!(peer = %peer_addr, %conn_id, "connection handed to hub"),
                Err(e) => warn!(peer = %peer_addr, error = %e, "connection not established"),
            }
        });
    }
}

/// Upgrade one raw stream and establish it with the hub.
///
/// Fails with [`HubError::Handshake`] when the upgrade fails, including
/// requests refused for a wrong path (404) or a missing identity (401).
pub async fn accept_connection<S, P>(
    stream: S,
    peer_addr: SocketAddr,
    hub: &HubHandle,
    provider: &P,
    ws_path: &str,
) -> HubResult<ConnectionId>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    P: IdentityProvider + ?Sized,
{
    let mut identity: Option<Identity> = None;

    let callback = |request: &Request, response: Response| {
        if request.uri().path() != ws_path {
            return Err(reject(StatusCode::NOT_FOUND, "Not Found"));
        }
        match provider.identify(request) {
            Some(found) => {
                identity = Some(found);
                Ok(response)
            }
            None => Err(reject(StatusCode::UNAUTHORIZED, "Unauthorized")),
        }
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(HubError::Handshake)?;

    let identity = identity.ok_or_else(|| {
        HubError::Handshake(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
    })?;

    debug!(peer = %peer_addr, user_id = %identity.user_id, "websocket upgraded");
    hub.establish(identity, ws).await
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}
