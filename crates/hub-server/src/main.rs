//! WebSocket hub server binary.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hub_protocol::DirectFormat;
use hub_server::config::{Config, OverflowPolicy};
use hub_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line overrides; anything not given falls back to `HUB_*` env vars.
#[derive(Parser, Debug)]
#[command(name = "hub-server", version, about = "Presence and direct-message hub")]
struct Cli {
    /// Interface to bind
    #[arg(long)]
    bind: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket upgrade path
    #[arg(long)]
    path: Option<String>,

    /// Maximum registered clients
    #[arg(long)]
    max_clients: Option<usize>,

    /// Per-client outbound mailbox capacity
    #[arg(long)]
    mailbox_capacity: Option<usize>,

    /// What to do with a full mailbox: disconnect | drop-newest
    #[arg(long)]
    overflow: Option<OverflowPolicy>,

    /// How direct messages reach the receiver: raw | envelope
    #[arg(long)]
    direct_format: Option<DirectFormat>,

    /// Milliseconds a hung-up writer may keep flushing before it is aborted
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.path {
            config.ws_path = path;
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = max_clients;
        }
        if let Some(capacity) = self.mailbox_capacity {
            config.hub.mailbox_capacity = capacity;
        }
        if let Some(overflow) = self.overflow {
            config.hub.overflow = overflow;
        }
        if let Some(format) = self.direct_format {
            config.hub.direct_format = format;
        }
        if let Some(ms) = self.drain_timeout_ms {
            config.hub.drain_timeout = Duration::from_millis(ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let mut config = Config::from_env().context("reading HUB_* environment")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    info!(
        addr = %config.socket_addr_string(),
        max_clients = config.max_clients,
        mailbox_capacity = config.hub.mailbox_capacity,
        overflow = %config.hub.overflow,
        direct_format = %config.hub.direct_format,
        "starting hub-server"
    );

    server::run(config).await.context("hub server stopped")?;
    Ok(())
}
