//! Node configuration loading and validation.
//!
//! [`Settings`] mirrors the TOML file and CLI flags and may hold invalid
//! values. [`Settings::validate`] turns it into an immutable [`NodeConfig`]
//! or rejects it with a [`ConfigError`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use libp2p::identity::Keypair;
use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys;

/// Default port for both the local listener and the bootstrap peer.
pub const DEFAULT_PORT: u32 = 52386;

/// Full configuration for the Murmur node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Local listener.
    #[serde(default)]
    pub network: NetworkSettings,

    /// Bootstrap peer used to seed membership.
    #[serde(default)]
    pub bootstrap: BootstrapSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Gossip heartbeat.
    #[serde(default)]
    pub gossip: GossipSettings,

    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Bind address. Unset binds all interfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSettings {
    /// IP literal or host name of the bootstrap peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Seconds between discovery rounds.
    #[serde(default = "default_discovery_interval")]
    pub interval_secs: i64,
    /// Deadline for a single round in seconds. 0 disables the deadline.
    #[serde(default = "default_round_timeout")]
    pub round_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    /// Text carried in every heartbeat.
    #[serde(default = "default_heartbeat_message")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentitySettings {
    /// Hex private key file. A fresh identity is generated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub debug: bool,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_port() -> u32 {
    DEFAULT_PORT
}
fn default_discovery_interval() -> i64 {
    5
}
fn default_round_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_heartbeat_interval() -> u64 {
    1
}
fn default_heartbeat_message() -> String {
    "hello".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
        }
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            interval_secs: default_discovery_interval(),
            round_timeout_secs: default_round_timeout(),
        }
    }
}

impl Default for GossipSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_heartbeat_interval(),
            message: default_heartbeat_message(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            debug: false,
            format: default_log_format(),
        }
    }
}

/// Bootstrap peer after name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPeer {
    /// The address as the operator gave it.
    pub host: String,
    pub resolved: SocketAddr,
}

impl BootstrapPeer {
    pub fn multiaddr(&self) -> Multiaddr {
        socket_multiaddr(self.resolved.ip(), self.resolved.port())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub message: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_heartbeat_interval()),
            message: default_heartbeat_message(),
        }
    }
}

/// Validated node configuration. Never changes once a node is built from it.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_ip: Option<IpAddr>,
    pub port: u16,
    pub bootstrap: Option<BootstrapPeer>,
    pub discovery_interval: Duration,
    pub round_timeout: Option<Duration>,
    pub heartbeat: Option<HeartbeatConfig>,
    pub keypair: Option<Keypair>,
}

impl NodeConfig {
    /// A loopback configuration on an OS-assigned port, no bootstrap peer and
    /// no heartbeat.
    pub fn local(discovery_interval: Duration) -> Self {
        Self {
            bind_ip: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: 0,
            bootstrap: None,
            discovery_interval,
            round_timeout: None,
            heartbeat: None,
            keypair: None,
        }
    }

    /// The multiaddress the node listens on.
    pub fn listen_multiaddr(&self) -> Multiaddr {
        let ip = self
            .bind_ip
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        socket_multiaddr(ip, self.port)
    }

    pub fn bootstrap_multiaddr(&self) -> Option<Multiaddr> {
        self.bootstrap.as_ref().map(BootstrapPeer::multiaddr)
    }
}

fn socket_multiaddr(ip: IpAddr, port: u16) -> Multiaddr {
    Multiaddr::from(ip).with(Protocol::Tcp(port))
}

impl Settings {
    /// Load config from a TOML file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check every setting and produce the node configuration.
    ///
    /// Checks run in a fixed order (bind address, bind port, bootstrap port,
    /// bootstrap address, intervals, key file) so the first problem reported
    /// is stable.
    pub fn validate(&self) -> Result<NodeConfig, ConfigError> {
        let bind_ip = match non_empty(&self.network.address) {
            Some(addr) => Some(
                addr.parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidAddress(addr.to_string()))?,
            ),
            None => None,
        };
        let port = validate_port(self.network.port)?;
        let bootstrap_port = validate_port(self.bootstrap.port)?;
        let bootstrap = match non_empty(&self.bootstrap.address) {
            Some(host) => Some(resolve_bootstrap(host, bootstrap_port)?),
            None => None,
        };

        let discovery_interval = u64::try_from(self.discovery.interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidDiscoveryInterval(
                self.discovery.interval_secs,
            ))?;
        let round_timeout = match self.discovery.round_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let heartbeat = if self.gossip.enabled {
            if self.gossip.interval_secs == 0 {
                return Err(ConfigError::InvalidHeartbeatInterval(0));
            }
            Some(HeartbeatConfig {
                interval: Duration::from_secs(self.gossip.interval_secs),
                message: self.gossip.message.clone(),
            })
        } else {
            None
        };

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidLogFormat(self.logging.format.clone()));
        }

        let keypair = match &self.identity.private_key_path {
            Some(path) if path.exists() => Some(keys::load_key_file(path)?),
            Some(path) => {
                tracing::warn!(
                    path = %path.display(),
                    "private key file not found, using a fresh identity"
                );
                None
            }
            None => None,
        };

        Ok(NodeConfig {
            bind_ip,
            port,
            bootstrap,
            discovery_interval,
            round_timeout,
            heartbeat,
            keypair,
        })
    }
}

/// Only an empty string counts as unset; whitespace is kept and validated.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn validate_port(port: u32) -> Result<u16, ConfigError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(ConfigError::InvalidPort(port)),
    }
}

/// IP literals are taken as-is; anything else goes through the system resolver.
fn resolve_bootstrap(host: &str, port: u16) -> Result<BootstrapPeer, ConfigError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(BootstrapPeer {
            host: host.to_string(),
            resolved: SocketAddr::new(ip, port),
        });
    }

    let resolved = (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::UnresolvablePeer(host.to_string()))?;
    tracing::debug!(host, resolved = %resolved.ip(), "resolved bootstrap peer");

    Ok(BootstrapPeer {
        host: host.to_string(),
        resolved,
    })
}
