//! Scriptable in-memory overlay for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use murmur_network::{DiscoveredPeer, NetworkError, Overlay};

#[derive(Default)]
pub(crate) struct MockOverlay {
    peer_id: Option<PeerId>,
    fail_pushes: bool,
    fail_listen: bool,
    fail_pings: bool,
    hang_discover: bool,
    rounds: Mutex<VecDeque<Result<Vec<DiscoveredPeer>, NetworkError>>>,
    pushes: Mutex<Vec<Vec<u8>>>,
    pings: Mutex<Vec<Multiaddr>>,
    discovers: AtomicUsize,
}

impl MockOverlay {
    pub(crate) fn new() -> Self {
        Self {
            peer_id: Some(PeerId::random()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_pushes(mut self) -> Self {
        self.fail_pushes = true;
        self
    }

    pub(crate) fn failing_listen(mut self) -> Self {
        self.fail_listen = true;
        self
    }

    pub(crate) fn failing_pings(mut self) -> Self {
        self.fail_pings = true;
        self
    }

    pub(crate) fn hanging_discover(mut self) -> Self {
        self.hang_discover = true;
        self
    }

    /// Queue the outcome of the next discovery call. Unscripted calls find nobody.
    pub(crate) fn with_round(self, result: Result<Vec<DiscoveredPeer>, NetworkError>) -> Self {
        self.rounds.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn pushes(&self) -> Vec<Vec<u8>> {
        self.pushes.lock().unwrap().clone()
    }

    pub(crate) fn pings(&self) -> Vec<Multiaddr> {
        self.pings.lock().unwrap().clone()
    }

    pub(crate) fn discover_calls(&self) -> usize {
        self.discovers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Overlay for MockOverlay {
    fn local_peer_id(&self) -> PeerId {
        self.peer_id.unwrap_or_else(PeerId::random)
    }

    async fn listen(&self, addr: Multiaddr) -> Result<Multiaddr, NetworkError> {
        if self.fail_listen {
            return Err(NetworkError::Listen("address in use".into()));
        }
        // Mimic the OS picking a port for port 0.
        Ok(addr
            .into_iter()
            .map(|p| match p {
                Protocol::Tcp(0) => Protocol::Tcp(40000),
                other => other,
            })
            .collect())
    }

    async fn ping(&self, addr: Multiaddr) -> Result<PeerId, NetworkError> {
        self.pings.lock().unwrap().push(addr);
        if self.fail_pings {
            return Err(NetworkError::Dial("connection refused".into()));
        }
        Ok(PeerId::random())
    }

    async fn discover(&self) -> Result<Vec<DiscoveredPeer>, NetworkError> {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        if self.hang_discover {
            return std::future::pending().await;
        }
        let next = self.rounds.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn push(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        if self.fail_pushes {
            return Err(NetworkError::Gossipsub("InsufficientPeers".into()));
        }
        self.pushes.lock().unwrap().push(payload);
        Ok(())
    }
}
