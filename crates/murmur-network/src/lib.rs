//! Murmur Overlay Networking Crate
//!
//! This crate provides the peer-to-peer layer a Murmur node is composed
//! from. Built on top of libp2p, it binds onto one swarm:
//!
//! - **Kademlia** for routing-table based peer discovery
//! - **GossipSub** for best-effort dissemination to overlay members
//! - **Identify** for exchanging listen addresses
//!
//! The swarm is owned by an [`OverlayHost`] task; callers drive it through
//! the [`Overlay`] operations on an [`OverlayHandle`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use murmur_network::{HostConfig, Keypair, Overlay, OverlayHost};
//!
//! #[tokio::main]
//! async fn main() {
//!     let keypair = Keypair::generate_ed25519();
//!     let (overlay, _task) = OverlayHost::spawn(keypair, HostConfig::default()).unwrap();
//!     let addr = overlay.listen("/ip4/0.0.0.0/tcp/52386".parse().unwrap()).await.unwrap();
//!     println!("listening on {addr}");
//! }
//! ```

pub mod behaviour;
pub mod discovery;
pub mod error;
pub mod events;
pub mod gossip;
pub mod host;
pub mod overlay;
pub mod transport;

// Re-exports for convenience.
pub use behaviour::{BehaviourConfig, OverlayBehaviour, OverlayBehaviourEvent};
pub use discovery::{DiscoveredPeer, PeerSet};
pub use error::NetworkError;
pub use events::{GossipMessage, NetworkEvent, PeerConnected, PeerDisconnected};
pub use gossip::TopicManager;
pub use host::{HostCommand, HostConfig, OverlayHandle, OverlayHost};
pub use overlay::Overlay;
pub use transport::TransportConfig;

// Re-export commonly used libp2p types for downstream convenience.
pub use libp2p::{identity::Keypair, Multiaddr, PeerId};
