//! The Murmur server node.
//!
//! A [`ServerNode`] ties an overlay host to a discovery scheduler. It is
//! built from a validated [`NodeConfig`], opens its listener with
//! [`ServerNode::listen`] and then keeps its view of the overlay fresh by
//! running discovery rounds on a fixed interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libp2p::identity::Keypair;
use libp2p::{Multiaddr, PeerId};
use murmur_network::{
    DiscoveredPeer, HostConfig, NetworkError, NetworkEvent, Overlay, OverlayHandle, OverlayHost,
    PeerSet,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::scheduler::{DiscoveryRound, DiscoveryScheduler, SchedulerState};

/// State shared between the node and its discovery loop.
struct NodeInner<O> {
    overlay: Arc<O>,
    bootstrap: Option<Multiaddr>,
    round_timeout: Option<Duration>,
    peers: PeerSet,
}

impl<O: Overlay> NodeInner<O> {
    async fn discover(&self) -> usize {
        if let Some(addr) = &self.bootstrap {
            match self.bounded(self.overlay.ping(addr.clone())).await {
                Some(Ok(peer)) => debug!(%peer, %addr, "bootstrap peer is reachable"),
                Some(Err(e)) => warn!(%addr, error = %e, "bootstrap peer ping failed"),
                None => warn!(%addr, "bootstrap peer ping timed out"),
            }
        }

        let peers = match self.bounded(self.overlay.discover()).await {
            Some(Ok(peers)) => peers,
            Some(Err(e)) => {
                warn!(error = %e, "discovery round failed");
                Vec::new()
            }
            None => {
                warn!(
                    timeout_secs = self.round_timeout.map(|t| t.as_secs()),
                    "discovery round timed out"
                );
                Vec::new()
            }
        };

        let found = peers.len();
        self.peers.replace(peers);
        found
    }

    /// Apply the round deadline, if any. `None` means the deadline passed.
    async fn bounded<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.round_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
            None => Some(fut.await),
        }
    }
}

#[async_trait]
impl<O: Overlay> DiscoveryRound for NodeInner<O> {
    async fn run_round(&self) -> usize {
        self.discover().await
    }
}

/// A participant in the overlay.
pub struct ServerNode<O: Overlay = OverlayHandle> {
    config: NodeConfig,
    inner: Arc<NodeInner<O>>,
    scheduler: DiscoveryScheduler,
    listen_addr: Option<Multiaddr>,
    host_task: Option<JoinHandle<()>>,
}

impl ServerNode<OverlayHandle> {
    /// Build the overlay host and spawn its event loop.
    ///
    /// Uses the configured key, or a fresh Ed25519 identity when there is none.
    pub fn init(config: NodeConfig) -> Result<Self, NodeError> {
        let keypair = match &config.keypair {
            Some(keypair) => keypair.clone(),
            None => {
                debug!("no private key configured, generating one");
                Keypair::generate_ed25519()
            }
        };

        let (overlay, host_task) =
            OverlayHost::spawn(keypair, HostConfig::default()).map_err(NodeError::Construction)?;
        info!(peer_id = %overlay.local_peer_id(), "node initialised");

        let mut node = Self::with_overlay(config, overlay);
        node.host_task = Some(host_task);
        Ok(node)
    }

    /// Subscribe to network events, including received gossip.
    pub fn events(&self) -> broadcast::Receiver<NetworkEvent> {
        self.inner.overlay.subscribe()
    }

    /// Stop discovery, then the host event loop.
    pub async fn shutdown(mut self) {
        self.stop_discovery().await;
        self.inner.overlay.shutdown().await;
        if let Some(task) = self.host_task.take() {
            let _ = task.await;
        }
        info!("node shut down");
    }
}

impl<O: Overlay> ServerNode<O> {
    /// Build a node on top of an existing overlay.
    pub fn with_overlay(config: NodeConfig, overlay: O) -> Self {
        let inner = Arc::new(NodeInner {
            overlay: Arc::new(overlay),
            bootstrap: config.bootstrap_multiaddr(),
            round_timeout: config.round_timeout,
            peers: PeerSet::new(),
        });

        Self {
            config,
            inner,
            scheduler: DiscoveryScheduler::new(),
            listen_addr: None,
            host_task: None,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn peer_id(&self) -> PeerId {
        self.inner.overlay.local_peer_id()
    }

    pub fn overlay(&self) -> Arc<O> {
        self.inner.overlay.clone()
    }

    /// Open the listener on the configured address.
    ///
    /// Returns once the socket is bound, with the concrete address (the real
    /// port when the configured one was 0).
    pub async fn listen(&mut self) -> Result<Multiaddr, NodeError> {
        let addr = self.config.listen_multiaddr();
        let bound = self
            .inner
            .overlay
            .listen(addr.clone())
            .await
            .map_err(|source| NodeError::Listen { addr, source })?;

        info!(peer_id = %self.peer_id(), address = %bound, "listening");
        self.listen_addr = Some(bound.clone());
        Ok(bound)
    }

    /// The concrete listen address, once [`listen`](Self::listen) succeeded.
    pub fn addr(&self) -> Option<&Multiaddr> {
        self.listen_addr.as_ref()
    }

    /// Run one discovery round now and return how many peers it found.
    ///
    /// Failures are logged; a failed round leaves an empty peer set.
    pub async fn discover(&self) -> usize {
        self.inner.discover().await
    }

    /// Start periodic discovery. Does nothing and returns `false` if it is
    /// already running.
    pub async fn start_discovery(&self) -> bool {
        self.scheduler
            .start(self.config.discovery_interval, self.inner.clone())
            .await
    }

    pub async fn stop_discovery(&self) {
        self.scheduler.stop().await;
    }

    pub async fn discovery_state(&self) -> SchedulerState {
        self.scheduler.state().await
    }

    /// Peers found by the most recent round.
    pub fn discovered_peers(&self) -> Arc<Vec<DiscoveredPeer>> {
        self.inner.peers.snapshot()
    }

    pub fn discovery_rounds(&self) -> u64 {
        self.inner.peers.rounds()
    }

    /// Push one message to the overlay.
    pub async fn send_gossip(&self, message: impl Into<Vec<u8>>) -> Result<(), NetworkError> {
        self.inner.overlay.push(message.into()).await
    }
}
