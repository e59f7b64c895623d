//! Combined libp2p behaviour for a Murmur overlay node.
//!
//! Binds the protocols the node speaks onto a single swarm:
//! - Kademlia: routing table and one-shot peer discovery
//! - GossipSub: best-effort dissemination to overlay members
//! - Identify: exchange of listen addresses so Kademlia learns dialable peers

use std::time::Duration;

use libp2p::identity::Keypair;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{gossipsub, identify, kad, PeerId, StreamProtocol};

use crate::error::NetworkError;

/// Kademlia protocol name used by Murmur nodes.
pub const KAD_PROTOCOL: StreamProtocol = StreamProtocol::new("/murmur/kad/1.0.0");

/// Identify protocol version advertised by Murmur nodes.
pub const IDENTIFY_PROTOCOL: &str = "/murmur/1.0.0";

/// Tunables for the bound protocols.
#[derive(Debug, Clone)]
pub struct BehaviourConfig {
    /// Upper bound for a single Kademlia query.
    pub kad_query_timeout: Duration,
    /// GossipSub mesh heartbeat.
    pub gossip_heartbeat: Duration,
}

impl Default for BehaviourConfig {
    fn default() -> Self {
        Self {
            kad_query_timeout: Duration::from_secs(30),
            gossip_heartbeat: Duration::from_secs(1),
        }
    }
}

/// Combined network behaviour for the overlay.
#[derive(NetworkBehaviour)]
pub struct OverlayBehaviour {
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
}

impl OverlayBehaviour {
    /// Build the behaviour with default tunables.
    pub fn new(keypair: &Keypair) -> Result<Self, NetworkError> {
        Self::with_config(keypair, &BehaviourConfig::default())
    }

    /// Build the behaviour for the given identity.
    pub fn with_config(keypair: &Keypair, config: &BehaviourConfig) -> Result<Self, NetworkError> {
        let local_peer_id = PeerId::from(keypair.public());

        let store = kad::store::MemoryStore::new(local_peer_id);
        let mut kad_config = kad::Config::new(KAD_PROTOCOL);
        kad_config.set_query_timeout(config.kad_query_timeout);
        let mut kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);
        // Answer inbound queries even before we learn an external address.
        kademlia.set_mode(Some(kad::Mode::Server));

        let gossip_config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(config.gossip_heartbeat)
            .validation_mode(gossipsub::ValidationMode::Strict)
            .build()
            .map_err(|e| NetworkError::Behaviour(format!("gossipsub config: {}", e)))?;
        let gossipsub = gossipsub::Behaviour::new(
            gossipsub::MessageAuthenticity::Signed(keypair.clone()),
            gossip_config,
        )
        .map_err(|e| NetworkError::Behaviour(format!("gossipsub: {}", e)))?;

        let identify = identify::Behaviour::new(identify::Config::new(
            IDENTIFY_PROTOCOL.to_string(),
            keypair.public(),
        ));

        Ok(Self {
            kademlia,
            gossipsub,
            identify,
        })
    }
}
