//! The operations a node needs from the overlay.
//!
//! `OverlayHandle` implements this against a live libp2p swarm; tests and
//! embedders may provide their own implementation.

use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId};

use crate::discovery::DiscoveredPeer;
use crate::error::NetworkError;

#[async_trait]
pub trait Overlay: Send + Sync + 'static {
    /// Identity of the local node.
    fn local_peer_id(&self) -> PeerId;

    /// Open the transport for inbound connections.
    ///
    /// Returns once the listening socket exists, with its concrete address.
    async fn listen(&self, addr: Multiaddr) -> Result<Multiaddr, NetworkError>;

    /// Dial an address and complete the handshake. Returns the remote identity.
    async fn ping(&self, addr: Multiaddr) -> Result<PeerId, NetworkError>;

    /// Run one routing-table refresh and report the peers it reached.
    async fn discover(&self) -> Result<Vec<DiscoveredPeer>, NetworkError>;

    /// Disseminate a payload to the overlay.
    async fn push(&self, payload: Vec<u8>) -> Result<(), NetworkError>;
}
