//! hub-server
//!
//! Multi-client WebSocket hub: tracks which authenticated user owns each
//! connection and routes direct messages and presence events between them.

pub mod config;
pub mod error;
pub mod identity;
pub mod server;
pub mod types;

// these are internal modules, not re-exported
mod connection;
mod hub_task;

pub use error::{HubError, HubResult};
pub use hub_task::{run_hub_loop, HubHandle, Registration};
