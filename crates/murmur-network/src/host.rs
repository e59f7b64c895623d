//! The Murmur overlay host.
//!
//! `OverlayHost` owns the libp2p `Swarm` and is driven by a single task.
//! Everything else talks to it through a cloneable `OverlayHandle`, which
//! sends commands over a channel and receives results on oneshot replies.
//! Network events are fanned out on a broadcast channel.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::core::transport::ListenerId;
use libp2p::identity::Keypair;
use libp2p::swarm::dial_opts::{DialOpts, PeerCondition};
use libp2p::swarm::{ConnectionId, DialError, SwarmEvent};
use libp2p::{gossipsub, identify, kad, Multiaddr, PeerId, Swarm};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::behaviour::{OverlayBehaviour, OverlayBehaviourEvent};
use crate::discovery::DiscoveredPeer;
use crate::error::NetworkError;
use crate::events::{GossipMessage, NetworkEvent, PeerConnected, PeerDisconnected};
use crate::gossip::TopicManager;
use crate::overlay::Overlay;
use crate::transport::{self, TransportConfig};

type Reply<T> = oneshot::Sender<Result<T, NetworkError>>;

/// Configuration for the overlay host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Swarm and protocol settings.
    pub transport: TransportConfig,
    /// Broadcast channel capacity for network events.
    pub event_channel_capacity: usize,
    /// Capacity of the command channel into the host task.
    pub command_channel_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            event_channel_capacity: 256,
            command_channel_capacity: 64,
        }
    }
}

/// Commands the host task executes on behalf of handles.
pub enum HostCommand {
    /// Open a listener.
    Listen { addr: Multiaddr, reply: Reply<Multiaddr> },
    /// Dial an address and wait for the handshake.
    Ping { addr: Multiaddr, reply: Reply<PeerId> },
    /// Run a Kademlia closest-peers lookup of our own identity.
    Discover { reply: Reply<Vec<DiscoveredPeer>> },
    /// Publish a payload on the overlay topic.
    Push { data: Vec<u8>, reply: Reply<()> },
    /// Stop the event loop.
    Shutdown,
}

struct PendingDial {
    addr: Multiaddr,
    reply: Reply<PeerId>,
}

/// The overlay host: owns the swarm and runs its event loop.
pub struct OverlayHost {
    local_peer_id: PeerId,
    swarm: Swarm<OverlayBehaviour>,
    topic_manager: TopicManager,
    event_tx: broadcast::Sender<NetworkEvent>,
    command_rx: mpsc::Receiver<HostCommand>,
    connected_peers: HashSet<PeerId>,
    pending_listens: HashMap<ListenerId, Reply<Multiaddr>>,
    pending_dials: HashMap<ConnectionId, PendingDial>,
    pending_queries: HashMap<kad::QueryId, Reply<Vec<DiscoveredPeer>>>,
    /// Identity behind each address a ping has reached.
    known_addrs: HashMap<Multiaddr, PeerId>,
}

/// Cloneable handle to a running `OverlayHost`.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    local_peer_id: PeerId,
    command_tx: mpsc::Sender<HostCommand>,
    event_tx: broadcast::Sender<NetworkEvent>,
}

impl OverlayHost {
    /// Build the swarm, bind the protocols and subscribe to the overlay topic.
    pub fn new(keypair: Keypair, config: HostConfig) -> Result<(Self, OverlayHandle), NetworkError> {
        let local_peer_id = PeerId::from(keypair.public());
        let mut swarm = transport::build_swarm(keypair, &config.transport)?;

        let topic_manager = TopicManager::new();
        topic_manager.subscribe_all(&mut swarm.behaviour_mut().gossipsub)?;

        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_capacity);

        tracing::info!(%local_peer_id, "creating overlay host");

        let host = Self {
            local_peer_id,
            swarm,
            topic_manager,
            event_tx: event_tx.clone(),
            command_rx,
            connected_peers: HashSet::new(),
            pending_listens: HashMap::new(),
            pending_dials: HashMap::new(),
            pending_queries: HashMap::new(),
            known_addrs: HashMap::new(),
        };
        let handle = OverlayHandle {
            local_peer_id,
            command_tx,
            event_tx,
        };
        Ok((host, handle))
    }

    /// Build the host and run its event loop on a background task.
    pub fn spawn(
        keypair: Keypair,
        config: HostConfig,
    ) -> Result<(OverlayHandle, JoinHandle<()>), NetworkError> {
        let (host, handle) = Self::new(keypair, config)?;
        let task = tokio::spawn(host.run());
        Ok((handle, task))
    }

    /// Run the event loop until `Shutdown` arrives or every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(peer_id = %self.local_peer_id, "overlay host event loop started");

        enum Action {
            SwarmEvent(SwarmEvent<OverlayBehaviourEvent>),
            Command(HostCommand),
            Stop,
        }

        loop {
            let action = tokio::select! {
                event = self.swarm.select_next_some() => Action::SwarmEvent(event),
                cmd = self.command_rx.recv() => match cmd {
                    Some(HostCommand::Shutdown) | None => Action::Stop,
                    Some(c) => Action::Command(c),
                },
            };

            match action {
                Action::SwarmEvent(event) => self.handle_swarm_event(event),
                Action::Command(cmd) => self.handle_command(cmd),
                Action::Stop => break,
            }
        }

        // Dropping the pending replies wakes their callers with `ShutDown`.
        self.pending_listens.clear();
        self.pending_dials.clear();
        self.pending_queries.clear();
        tracing::info!(peer_id = %self.local_peer_id, "overlay host event loop stopped");
    }

    fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Listen { addr, reply } => match self.swarm.listen_on(addr.clone()) {
                Ok(listener_id) => {
                    tracing::debug!(%addr, ?listener_id, "listener requested");
                    self.pending_listens.insert(listener_id, reply);
                }
                Err(e) => {
                    tracing::warn!(%addr, error = ?e, "failed to open listener");
                    let _ = reply.send(Err(e.into()));
                }
            },
            HostCommand::Ping { addr, reply } => {
                let known = self.known_addrs.get(&addr).copied();
                if let Some(peer_id) = known {
                    if self.swarm.is_connected(&peer_id) {
                        tracing::trace!(%peer_id, %addr, "ping reused existing connection");
                        let _ = reply.send(Ok(peer_id));
                        return;
                    }
                }

                let opts = match known {
                    Some(peer_id) => DialOpts::peer_id(peer_id)
                        .addresses(vec![addr.clone()])
                        .condition(PeerCondition::Disconnected)
                        .build(),
                    None => DialOpts::unknown_peer_id().address(addr.clone()).build(),
                };
                let connection_id = opts.connection_id();
                match self.swarm.dial(opts) {
                    Ok(()) => {
                        tracing::debug!(%addr, "dialing");
                        self.pending_dials
                            .insert(connection_id, PendingDial { addr, reply });
                    }
                    Err(e) => {
                        // A refused peer condition means we are already connected.
                        let result = match known {
                            Some(peer_id) if matches!(e, DialError::DialPeerConditionFalse(_)) => {
                                Ok(peer_id)
                            }
                            _ => Err(e.into()),
                        };
                        let _ = reply.send(result);
                    }
                }
            }
            HostCommand::Discover { reply } => {
                let local = self.local_peer_id;
                let query_id = self.swarm.behaviour_mut().kademlia.get_closest_peers(local);
                tracing::debug!(?query_id, "kademlia discovery query started");
                self.pending_queries.insert(query_id, reply);
            }
            HostCommand::Push { data, reply } => {
                let topic = self.topic_manager.overlay.clone();
                let bytes = data.len();
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(topic, data)
                    .map(|_| ())
                    .map_err(NetworkError::from);
                if result.is_ok() {
                    tracing::trace!(bytes, "published gossip");
                }
                let _ = reply.send(result);
            }
            HostCommand::Shutdown => {}
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<OverlayBehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(behaviour_event) => {
                self.handle_behaviour_event(behaviour_event);
            }
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                tracing::info!(%address, "listening on new address");
                if let Some(reply) = self.pending_listens.remove(&listener_id) {
                    let _ = reply.send(Ok(address.clone()));
                }
                let _ = self.event_tx.send(NetworkEvent::Listening { address });
            }
            SwarmEvent::ListenerClosed {
                listener_id,
                reason,
                ..
            } => {
                tracing::info!(?listener_id, ?reason, "listener closed");
                if let Some(reply) = self.pending_listens.remove(&listener_id) {
                    let _ = reply.send(Err(NetworkError::Listen(format!(
                        "listener closed: {:?}",
                        reason
                    ))));
                }
            }
            SwarmEvent::ListenerError { listener_id, error } => {
                tracing::error!(?listener_id, error = %error, "listener error");
                if let Some(reply) = self.pending_listens.remove(&listener_id) {
                    let _ = reply.send(Err(NetworkError::Listen(error.to_string())));
                }
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                num_established,
                ..
            } => {
                self.connected_peers.insert(peer_id);
                tracing::debug!(
                    %peer_id,
                    num_established = num_established.get(),
                    total_connected = self.connected_peers.len(),
                    "connection established"
                );
                if let Some(dial) = self.pending_dials.remove(&connection_id) {
                    let remote = endpoint.get_remote_address().clone();
                    let behaviour = self.swarm.behaviour_mut();
                    behaviour.kademlia.add_address(&peer_id, remote);
                    behaviour.gossipsub.add_explicit_peer(&peer_id);
                    tracing::debug!(%peer_id, addr = %dial.addr, "ping succeeded");
                    self.known_addrs.insert(dial.addr, peer_id);
                    let _ = dial.reply.send(Ok(peer_id));
                }
                let _ = self.event_tx.send(NetworkEvent::PeerConnected(PeerConnected {
                    peer_id,
                    num_connected: self.connected_peers.len(),
                }));
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                if num_established == 0 {
                    self.connected_peers.remove(&peer_id);
                }
                tracing::debug!(
                    %peer_id,
                    num_established,
                    total_connected = self.connected_peers.len(),
                    "connection closed"
                );
                let _ = self
                    .event_tx
                    .send(NetworkEvent::PeerDisconnected(PeerDisconnected {
                        peer_id,
                        num_connected: self.connected_peers.len(),
                    }));
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
            } => {
                tracing::debug!(?peer_id, error = %error, "outgoing connection error");
                if let Some(dial) = self.pending_dials.remove(&connection_id) {
                    let _ = dial.reply.send(Err(NetworkError::Dial(format!(
                        "{}: {}",
                        dial.addr, error
                    ))));
                }
            }
            SwarmEvent::IncomingConnectionError { error, .. } => {
                tracing::debug!(error = %error, "incoming connection error");
            }
            _ => {}
        }
    }

    fn handle_behaviour_event(&mut self, event: OverlayBehaviourEvent) {
        match event {
            OverlayBehaviourEvent::Kademlia(kad::Event::RoutingUpdated {
                peer, is_new_peer, ..
            }) => {
                tracing::debug!(%peer, is_new_peer, "kademlia routing updated");
                // Gossip follows the routing table's membership view.
                self.swarm
                    .behaviour_mut()
                    .gossipsub
                    .add_explicit_peer(&peer);
                let _ = self
                    .event_tx
                    .send(NetworkEvent::RoutingUpdated { peer, is_new_peer });
            }
            OverlayBehaviourEvent::Kademlia(kad::Event::OutboundQueryProgressed {
                id,
                result: kad::QueryResult::GetClosestPeers(result),
                ..
            }) => {
                let peers = match result {
                    Ok(ok) => ok.peers,
                    Err(kad::GetClosestPeersError::Timeout { peers, .. }) => {
                        tracing::warn!(found = peers.len(), "kademlia discovery query timed out");
                        peers
                    }
                };
                let peers: Vec<DiscoveredPeer> = peers
                    .into_iter()
                    .map(|info| DiscoveredPeer::new(info.peer_id, info.addrs))
                    .collect();
                if let Some(reply) = self.pending_queries.remove(&id) {
                    let _ = reply.send(Ok(peers));
                }
            }
            OverlayBehaviourEvent::Kademlia(event) => {
                tracing::trace!(?event, "kademlia event");
            }

            OverlayBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            }) => {
                let topic = self
                    .topic_manager
                    .topic_name_from_hash(&message.topic)
                    .unwrap_or("unknown")
                    .to_string();
                let msg = GossipMessage {
                    source: message.source,
                    propagated_by: propagation_source,
                    data: message.data,
                    topic,
                };
                tracing::info!(
                    sender = %msg.sender(),
                    topic = %msg.topic,
                    bytes = msg.data.len(),
                    "got a gossip"
                );
                let _ = self.event_tx.send(NetworkEvent::GossipReceived(msg));
            }
            OverlayBehaviourEvent::Gossipsub(gossipsub::Event::Subscribed { peer_id, topic }) => {
                tracing::debug!(%peer_id, %topic, "peer subscribed to topic");
            }
            OverlayBehaviourEvent::Gossipsub(_) => {}

            OverlayBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                tracing::debug!(
                    %peer_id,
                    protocol_version = %info.protocol_version,
                    "identify: received peer info"
                );
                let kademlia = &mut self.swarm.behaviour_mut().kademlia;
                for addr in info.listen_addrs {
                    kademlia.add_address(&peer_id, addr);
                }
            }
            OverlayBehaviourEvent::Identify(_) => {}
        }
    }
}

impl OverlayHandle {
    /// Subscribe to network events (the received-gossip hook among them).
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the host task to stop. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(HostCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> HostCommand,
    ) -> Result<T, NetworkError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(make(reply))
            .await
            .map_err(|_| NetworkError::ShutDown)?;
        rx.await.map_err(|_| NetworkError::ShutDown)?
    }
}

#[async_trait]
impl Overlay for OverlayHandle {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn listen(&self, addr: Multiaddr) -> Result<Multiaddr, NetworkError> {
        self.request(|reply| HostCommand::Listen { addr, reply }).await
    }

    async fn ping(&self, addr: Multiaddr) -> Result<PeerId, NetworkError> {
        self.request(|reply| HostCommand::Ping { addr, reply }).await
    }

    async fn discover(&self) -> Result<Vec<DiscoveredPeer>, NetworkError> {
        self.request(|reply| HostCommand::Discover { reply }).await
    }

    async fn push(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        self.request(|reply| HostCommand::Push {
            data: payload,
            reply,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::multiaddr::Protocol;

    fn spawn_host() -> (OverlayHandle, JoinHandle<()>) {
        OverlayHost::spawn(Keypair::generate_ed25519(), HostConfig::default())
            .expect("host creation")
    }

    fn loopback(port: u16) -> Multiaddr {
        format!("/ip4/127.0.0.1/tcp/{}", port)
            .parse()
            .expect("multiaddr")
    }

    fn tcp_port(addr: &Multiaddr) -> Option<u16> {
        addr.iter().find_map(|p| match p {
            Protocol::Tcp(port) => Some(port),
            _ => None,
        })
    }

    #[test]
    fn test_host_config_default() {
        let config = HostConfig::default();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.command_channel_capacity, 64);
    }

    #[tokio::test]
    async fn test_handle_reports_local_peer_id() {
        let keypair = Keypair::generate_ed25519();
        let expected = PeerId::from(keypair.public());
        let (_host, handle) = OverlayHost::new(keypair, HostConfig::default()).expect("host");
        assert_eq!(handle.local_peer_id(), expected);
    }

    #[tokio::test]
    async fn test_listen_returns_concrete_address() {
        let (handle, _task) = spawn_host();
        let addr = handle.listen(loopback(0)).await.expect("listen");
        let port = tcp_port(&addr).expect("tcp port");
        assert_ne!(port, 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_listen_on_bound_port_fails() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = occupied.local_addr().expect("local addr").port();

        let (handle, _task) = spawn_host();
        let result = handle.listen(loopback(port)).await;
        assert!(matches!(result, Err(NetworkError::Listen(_))), "{:?}", result);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_discover_with_empty_routing_table() {
        let (handle, _task) = spawn_host();
        let peers = handle.discover().await.expect("discover");
        assert!(peers.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_push_without_peers_fails() {
        let (handle, _task) = spawn_host();
        let result = handle.push(b"hello".to_vec()).await;
        assert!(matches!(result, Err(NetworkError::Gossipsub(_))), "{:?}", result);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_ping_closed_port_fails() {
        let port = {
            let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            closed.local_addr().expect("local addr").port()
        };

        let (handle, _task) = spawn_host();
        let result = handle.ping(loopback(port)).await;
        assert!(matches!(result, Err(NetworkError::Dial(_))), "{:?}", result);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeated_ping_reuses_connection() {
        let (a, _a_task) = spawn_host();
        let a_addr = a.listen(loopback(0)).await.expect("listen a");
        let (b, _b_task) = spawn_host();
        let mut events = b.subscribe();

        for _ in 0..5 {
            let remote = b.ping(a_addr.clone()).await.expect("ping");
            assert_eq!(remote, a.local_peer_id());
        }

        // Let any stray connection attempts surface.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let mut opened = 0;
        while let Ok(event) = events.try_recv() {
            if let NetworkEvent::PeerConnected(e) = event {
                if e.peer_id == a.local_peer_id() {
                    opened += 1;
                }
            }
        }
        assert_eq!(opened, 1);

        b.shutdown().await;
        a.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let (handle, task) = spawn_host();
        handle.shutdown().await;
        task.await.expect("host task");

        let result = handle.discover().await;
        assert!(matches!(result, Err(NetworkError::ShutDown)));
        // A second shutdown is harmless.
        handle.shutdown().await;
    }
}
