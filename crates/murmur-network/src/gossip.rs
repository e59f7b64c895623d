//! GossipSub topic management for the Murmur overlay.
//!
//! The overlay gossips on a single topic. Payload content belongs to the
//! caller; this module only fixes where it is published.

use libp2p::gossipsub;

/// Murmur GossipSub topic names.
pub mod topics {
    /// Topic every overlay member subscribes to.
    pub const OVERLAY: &str = "murmur/overlay/v1";
}

/// Manager for the overlay's GossipSub topic.
#[derive(Debug, Clone)]
pub struct TopicManager {
    /// The overlay-wide topic.
    pub overlay: gossipsub::IdentTopic,
}

impl TopicManager {
    pub fn new() -> Self {
        Self {
            overlay: gossipsub::IdentTopic::new(topics::OVERLAY),
        }
    }

    /// Get the hash for the overlay topic.
    pub fn overlay_hash(&self) -> gossipsub::TopicHash {
        self.overlay.hash()
    }

    /// Subscribe the given gossipsub behaviour to the overlay topic.
    pub fn subscribe_all(
        &self,
        gossipsub: &mut gossipsub::Behaviour,
    ) -> Result<(), crate::error::NetworkError> {
        gossipsub.subscribe(&self.overlay).map_err(|e| {
            crate::error::NetworkError::Gossipsub(format!(
                "failed to subscribe to {}: {}",
                self.overlay.hash(),
                e
            ))
        })?;
        Ok(())
    }

    /// Determine the topic name from a TopicHash.
    pub fn topic_name_from_hash(&self, hash: &gossipsub::TopicHash) -> Option<&'static str> {
        if *hash == self.overlay_hash() {
            Some(topics::OVERLAY)
        } else {
            None
        }
    }
}

impl Default for TopicManager {
    fn default() -> Self {
        Self::new()
    }
}
