//! Helpers shared by the loopback integration scenarios.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use murmur_node::{BootstrapPeer, NodeConfig};

/// Loopback node on an OS-assigned port with a one second discovery interval.
pub fn loopback_config() -> NodeConfig {
    NodeConfig::local(Duration::from_secs(1))
}

/// Loopback config that bootstraps from a node listening on `addr`.
pub fn bootstrapped_from(addr: &Multiaddr) -> NodeConfig {
    let mut config = loopback_config();
    let port = tcp_port(addr).unwrap_or_default();
    config.bootstrap = Some(BootstrapPeer {
        host: Ipv4Addr::LOCALHOST.to_string(),
        resolved: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
    });
    config
}

pub fn tcp_port(addr: &Multiaddr) -> Option<u16> {
    addr.iter().find_map(|p| match p {
        Protocol::Tcp(port) => Some(port),
        _ => None,
    })
}
