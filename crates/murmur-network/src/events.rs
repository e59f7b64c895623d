//! Network event types for the Murmur overlay.
//!
//! These events are emitted by the host event loop so that the node and
//! other subscribers can react to network activity.

use libp2p::{Multiaddr, PeerId};

/// High-level events emitted by the overlay host.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A new peer connected to this node.
    PeerConnected(PeerConnected),

    /// A peer disconnected from this node.
    PeerDisconnected(PeerDisconnected),

    /// A gossip payload arrived on the overlay topic.
    GossipReceived(GossipMessage),

    /// Kademlia added or refreshed a peer in the routing table.
    RoutingUpdated {
        /// The peer whose routing entry changed.
        peer: PeerId,
        /// Whether the peer was not in the table before.
        is_new_peer: bool,
    },

    /// This node started listening on an address.
    Listening {
        /// The address we are now listening on.
        address: Multiaddr,
    },
}

/// Emitted when a new peer connects.
#[derive(Debug, Clone)]
pub struct PeerConnected {
    /// The PeerId of the connected peer.
    pub peer_id: PeerId,
    /// Number of currently connected peers (including this one).
    pub num_connected: usize,
}

/// Emitted when a peer disconnects.
#[derive(Debug, Clone)]
pub struct PeerDisconnected {
    /// The PeerId of the disconnected peer.
    pub peer_id: PeerId,
    /// Number of remaining connected peers.
    pub num_connected: usize,
}

/// A payload received over GossipSub.
#[derive(Debug, Clone)]
pub struct GossipMessage {
    /// Original author of the message, if it was signed.
    pub source: Option<PeerId>,
    /// The neighbour that forwarded the message to us.
    pub propagated_by: PeerId,
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// The gossipsub topic the message arrived on.
    pub topic: String,
}

impl GossipMessage {
    /// Best-known sender: the signing author, else the forwarding neighbour.
    pub fn sender(&self) -> PeerId {
        self.source.unwrap_or(self.propagated_by)
    }
}
