//! Murmur Node
//!
//! A long-running participant in the Murmur overlay. The node listens for
//! inbound connections, refreshes its view of the overlay on a fixed
//! interval (optionally seeded from a bootstrap peer) and pushes a gossip
//! heartbeat so that membership stays warm.
//!
//! The `murmur-node` binary wires these pieces to a CLI; the library is
//! usable on its own:
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use murmur_node::{NodeConfig, ServerNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), murmur_node::NodeError> {
//!     let mut node: ServerNode = ServerNode::init(NodeConfig::local(Duration::from_secs(5)))?;
//!     node.listen().await?;
//!     node.start_discovery().await;
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//!     node.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod keys;
pub mod node;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use config::{BootstrapPeer, HeartbeatConfig, NodeConfig, Settings};
pub use error::{ConfigError, KeyError, NodeError};
pub use heartbeat::{Heartbeat, HeartbeatPayload};
pub use node::ServerNode;
pub use runner::run_until;
pub use scheduler::{DiscoveryRound, DiscoveryScheduler, SchedulerState};
