//! Full node lifecycle: build, listen, discover, gossip, shut down.

use std::future::Future;

use murmur_network::{GossipMessage, NetworkEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::heartbeat::{Heartbeat, HeartbeatPayload};
use crate::node::ServerNode;

/// Run a node until `shutdown` resolves.
///
/// Construction and listen failures are returned before discovery starts.
/// On shutdown discovery is stopped first, then the heartbeat, then the host.
pub async fn run_until<F>(config: NodeConfig, shutdown: F) -> Result<(), NodeError>
where
    F: Future<Output = ()>,
{
    let heartbeat_config = config.heartbeat.clone();
    let mut node: ServerNode = ServerNode::init(config)?;
    let mut events = node.events();
    if let Err(e) = node.listen().await {
        node.shutdown().await;
        return Err(e);
    }
    node.start_discovery().await;

    let heartbeat = heartbeat_config.map(|cfg| {
        info!(interval_secs = cfg.interval.as_secs(), "starting gossip heartbeat");
        Heartbeat::spawn(node.overlay(), cfg)
    });

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("initiating graceful shutdown");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => handle_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    warn!("overlay host stopped unexpectedly");
                    break;
                }
            },
        }
    }

    node.stop_discovery().await;
    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown().await;
    }
    node.shutdown().await;
    Ok(())
}

fn handle_event(event: NetworkEvent) {
    match event {
        NetworkEvent::GossipReceived(msg) => handle_gossip(&msg),
        NetworkEvent::PeerConnected(e) => {
            debug!(peer = %e.peer_id, connected = e.num_connected, "peer connected");
        }
        NetworkEvent::PeerDisconnected(e) => {
            debug!(peer = %e.peer_id, connected = e.num_connected, "peer disconnected");
        }
        NetworkEvent::RoutingUpdated { peer, is_new_peer } => {
            debug!(%peer, is_new_peer, "routing table updated");
        }
        NetworkEvent::Listening { address } => {
            debug!(%address, "new listen address");
        }
    }
}

fn handle_gossip(msg: &GossipMessage) {
    match HeartbeatPayload::from_bytes(&msg.data) {
        Ok(payload) => debug!(
            sender = %payload.sender,
            sequence = payload.sequence,
            message = %payload.message,
            "heartbeat received"
        ),
        Err(_) => debug!(
            sender = %msg.sender(),
            bytes = msg.data.len(),
            "gossip received"
        ),
    }
}
