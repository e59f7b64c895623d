//! Network error types for the Murmur overlay layer.

use libp2p::{gossipsub, swarm::DialError, TransportError};

/// Errors that can occur in the Murmur network layer.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Transport-level error (TCP, Noise, Yamux).
    #[error("transport error: {0}")]
    Transport(String),

    /// Network behaviour construction failed.
    #[error("behaviour error: {0}")]
    Behaviour(String),

    /// GossipSub publish or subscription error.
    #[error("gossipsub error: {0}")]
    Gossipsub(String),

    /// Failed to dial a peer.
    #[error("dial error: {0}")]
    Dial(String),

    /// Error listening on an address.
    #[error("listen error: {0}")]
    Listen(String),

    /// The host event loop is no longer running.
    #[error("host shut down")]
    ShutDown,
}

impl From<gossipsub::PublishError> for NetworkError {
    fn from(err: gossipsub::PublishError) -> Self {
        NetworkError::Gossipsub(err.to_string())
    }
}

impl From<DialError> for NetworkError {
    fn from(err: DialError) -> Self {
        NetworkError::Dial(err.to_string())
    }
}

impl<T: std::fmt::Debug> From<TransportError<T>> for NetworkError {
    fn from(err: TransportError<T>) -> Self {
        NetworkError::Listen(format!("{:?}", err))
    }
}
