//! Discovered-peer bookkeeping for a Murmur node.
//!
//! Each discovery round produces a complete point-in-time view of the peers
//! the routing protocol could reach. The view is swapped in whole; readers
//! holding an older snapshot keep it unchanged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use libp2p::{Multiaddr, PeerId};

/// A peer reported by one discovery round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// The peer's identity.
    pub peer_id: PeerId,
    /// Addresses the routing table knows for the peer.
    pub addrs: Vec<Multiaddr>,
}

impl DiscoveredPeer {
    pub fn new(peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self { peer_id, addrs }
    }
}

/// The node's latest discovered-peer set.
#[derive(Debug, Default)]
pub struct PeerSet {
    current: RwLock<Arc<Vec<DiscoveredPeer>>>,
    rounds: AtomicU64,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with the result of the latest round.
    pub fn replace(&self, peers: Vec<DiscoveredPeer>) {
        let next = Arc::new(peers);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
        drop(guard);
        self.rounds.fetch_add(1, Ordering::SeqCst);
    }

    /// Cheap snapshot of the current set.
    pub fn snapshot(&self) -> Arc<Vec<DiscoveredPeer>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of peers in the current set.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rounds recorded so far.
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::SeqCst)
    }
}
