//! Error types for the hub server.
//!
//! Nothing here is fatal to the process: each variant ends, at most, the
//! one request or connection it came from. Routing to an offline user is
//! not an error at all (see `hub_core::RouteOutcome::Miss`).

use hub_protocol::FrameError;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Result alias used across the server crate.
pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    /// The WebSocket upgrade failed or was refused.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] WsError),

    /// A client sent a frame the codec could not decode.
    #[error(transparent)]
    MalformedFrame(#[from] FrameError),

    /// Read or write on an established connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] WsError),

    /// The hub loop has stopped and no longer accepts commands.
    #[error("hub loop is not running")]
    HubClosed,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
