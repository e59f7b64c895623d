//! Error types for the Murmur node.

use libp2p::Multiaddr;
use murmur_network::NetworkError;
use thiserror::Error;

/// Rejections raised while turning settings into a [`NodeConfig`](crate::config::NodeConfig).
///
/// The messages are shown to operators verbatim, prefixed with `Error: `.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not a valid port number (1-65535)")]
    InvalidPort(u32),

    #[error("{0} is not a valid ip address")]
    InvalidAddress(String),

    #[error("\"{0}\" does not appear to be a valid ip address or server name")]
    UnresolvablePeer(String),

    #[error("{0} is not a valid discovery interval (must be at least 1 second)")]
    InvalidDiscoveryInterval(i64),

    #[error("{0} is not a valid heartbeat interval (must be at least 1 second)")]
    InvalidHeartbeatInterval(u64),

    #[error("{0} is not a valid log format (expected text or json)")]
    InvalidLogFormat(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Failures reading or writing private key files.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unable to read private key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write private key file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode hex key from file: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid ed25519 key material: {0}")]
    Decode(String),
}

/// Fatal node lifecycle errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to construct node: {0}")]
    Construction(#[source] NetworkError),

    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: Multiaddr,
        #[source]
        source: NetworkError,
    },
}
