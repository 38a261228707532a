//! Configuration for the hub server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `HUB_BIND_ADDR`         (default: "0.0.0.0")
//! - `HUB_PORT`              (default: "8000")
//! - `HUB_WS_PATH`           (default: "/ws")
//! - `HUB_MAX_CLIENTS`       (default: "1024")
//! - `HUB_MAILBOX_CAPACITY`  (default: "256")
//! - `HUB_COMMAND_CAPACITY`  (default: "1024")
//! - `HUB_OVERFLOW_POLICY`   (default: "disconnect"; or "drop-newest")
//! - `HUB_DIRECT_FORMAT`     (default: "raw"; or "envelope")
//! - `HUB_DRAIN_TIMEOUT_MS`  (default: "1000")
//!
//! The binary lets CLI flags override individual values afterwards.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use hub_protocol::DirectFormat;

use crate::error::HubError;

/// What the hub loop does when a receiver's mailbox is full.
///
/// The hub loop never waits on a mailbox, so one slow reader cannot
/// stall routing for everybody else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Unregister the slow receiver and close its mailbox.
    #[default]
    Disconnect,

    /// Discard the frame that did not fit.
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnect" => Ok(OverflowPolicy::Disconnect),
            "drop-newest" | "drop_newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(HubError::Config(format!("unknown overflow policy: {other}"))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Disconnect => write!(f, "disconnect"),
            OverflowPolicy::DropNewest => write!(f, "drop-newest"),
        }
    }
}

/// Settings for the hub loop itself.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each client's outbound mailbox.
    pub mailbox_capacity: usize,

    /// Capacity of the channel feeding the hub loop.
    pub command_capacity: usize,

    pub overflow: OverflowPolicy,

    /// Wire shape of direct messages sent to receivers.
    pub direct_format: DirectFormat,

    /// Once a connection is hung up, how long its writer may keep
    /// flushing queued frames before it is aborted.
    pub drain_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            mailbox_capacity: 256,
            command_capacity: 1024,
            overflow: OverflowPolicy::default(),
            direct_format: DirectFormat::default(),
            drain_timeout: Duration::from_millis(1000),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Request path accepted for the WebSocket upgrade.
    pub ws_path: String,

    /// Maximum number of simultaneously registered clients.
    pub max_clients: usize,

    pub hub: HubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            ws_path: "/ws".to_string(),
            max_clients: 1024,
            hub: HubConfig::default(),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults above.
    pub fn from_env() -> Result<Self, HubError> {
        let defaults = Config::default();

        let config = Config {
            bind_addr: env::var("HUB_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: read_env_or_default("HUB_PORT", defaults.port)?,
            ws_path: env::var("HUB_WS_PATH").unwrap_or(defaults.ws_path),
            max_clients: read_env_or_default("HUB_MAX_CLIENTS", defaults.max_clients)?,
            hub: HubConfig {
                mailbox_capacity: read_env_or_default(
                    "HUB_MAILBOX_CAPACITY",
                    defaults.hub.mailbox_capacity,
                )?,
                command_capacity: read_env_or_default(
                    "HUB_COMMAND_CAPACITY",
                    defaults.hub.command_capacity,
                )?,
                overflow: read_env_or_default("HUB_OVERFLOW_POLICY", defaults.hub.overflow)?,
                direct_format: read_env_or_default(
                    "HUB_DIRECT_FORMAT",
                    defaults.hub.direct_format,
                )?,
                drain_timeout: Duration::from_millis(read_env_or_default(
                    "HUB_DRAIN_TIMEOUT_MS",
                    defaults.hub.drain_timeout.as_millis() as u64,
                )?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make channels or routing unusable.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.hub.mailbox_capacity == 0 {
            return Err(HubError::Config("mailbox capacity must be > 0".into()));
        }
        if self.hub.command_capacity == 0 {
            return Err(HubError::Config("command capacity must be > 0".into()));
        }
        if !self.ws_path.starts_with('/') {
            return Err(HubError::Config(format!(
                "websocket path must start with '/': {}",
                self.ws_path
            )));
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T, HubError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| HubError::Config(format!("{key}={val}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr_string(), "0.0.0.0:8000");
        assert_eq!(config.hub.mailbox_capacity, 256);
        assert_eq!(config.hub.overflow, OverflowPolicy::Disconnect);
        assert_eq!(config.hub.direct_format, DirectFormat::Raw);
        assert_eq!(config.hub.drain_timeout, Duration::from_secs(1));
    }

    #[test]
    fn overflow_policy_parses() {
        assert_eq!("disconnect".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Disconnect);
        assert_eq!(" Drop-Newest ".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::DropNewest);
        assert!("block".parse::<OverflowPolicy>().is_err());
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "drop-newest");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.hub.mailbox_capacity = 0;
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
    }

    #[test]
    fn relative_path_is_rejected() {
        let config = Config {
            ws_path: "ws".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
