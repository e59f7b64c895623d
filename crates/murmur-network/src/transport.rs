//! libp2p transport stack construction for the Murmur overlay.
//!
//! Builds a swarm over TCP + Noise (handshake/encryption) + Yamux (multiplexing)
//! and binds the overlay behaviour onto it.

use std::time::Duration;

use libp2p::identity::Keypair;

use crate::behaviour::{BehaviourConfig, OverlayBehaviour};
use crate::error::NetworkError;

/// Configuration for building the overlay swarm.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Idle connection timeout.
    pub idle_connection_timeout: Duration,
    /// Protocol tunables.
    pub behaviour: BehaviourConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            idle_connection_timeout: Duration::from_secs(60),
            behaviour: BehaviourConfig::default(),
        }
    }
}

/// Build a libp2p Swarm with the overlay behaviour using TCP + Noise + Yamux.
pub fn build_swarm(
    keypair: Keypair,
    config: &TransportConfig,
) -> Result<libp2p::Swarm<OverlayBehaviour>, NetworkError> {
    // Build the behaviour up front so construction errors keep their type.
    let mut behaviour_slot = Some(OverlayBehaviour::with_config(&keypair, &config.behaviour)?);
    let idle_timeout = config.idle_connection_timeout;

    let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            libp2p::tcp::Config::default().nodelay(true),
            libp2p::noise::Config::new,
            libp2p::yamux::Config::default,
        )
        .map_err(|e| NetworkError::Transport(e.to_string()))?
        .with_behaviour(|_key| {
            behaviour_slot
                .take()
                .ok_or_else(|| Box::<dyn std::error::Error + Send + Sync>::from("behaviour already taken"))
        })
        .map_err(|e| NetworkError::Behaviour(e.to_string()))?
        .with_swarm_config(|cfg: libp2p::swarm::Config| {
            cfg.with_idle_connection_timeout(idle_timeout)
        })
        .build();

    Ok(swarm)
}
