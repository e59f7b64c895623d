//! Gossip heartbeat.
//!
//! Pushes a small JSON payload to the overlay at a fixed cadence, keeping
//! gossip flowing between nodes that have nothing else to say.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use murmur_network::Overlay;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HeartbeatConfig;

/// Wire payload of one heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Peer ID of the sending node.
    pub sender: String,
    /// Starts at 0 and grows by one per heartbeat from the same sender.
    pub sequence: u64,
    pub message: String,
}

impl HeartbeatPayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Handle to a running heartbeat task.
///
/// The task runs until [`Heartbeat::shutdown`] or until the handle is dropped.
pub struct Heartbeat {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Heartbeat {
    pub fn spawn<O: Overlay>(overlay: Arc<O>, config: HeartbeatConfig) -> Self {
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(heartbeat_loop(
            overlay,
            config,
            cancel.clone(),
            counters.clone(),
        ));

        Self {
            cancel,
            task: Some(task),
            counters,
        }
    }

    /// Heartbeats the overlay accepted.
    pub fn pushes_sent(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    pub fn pushes_failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn heartbeat_loop<O: Overlay>(
    overlay: Arc<O>,
    config: HeartbeatConfig,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    let sender = overlay.local_peer_id().to_string();
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let payload = HeartbeatPayload {
            sender: sender.clone(),
            sequence,
            message: config.message.clone(),
        };
        sequence += 1;

        let bytes = match payload.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode heartbeat");
                continue;
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = overlay.push(bytes) => result,
        };
        match result {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = payload.sequence, "sent test gossip");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, sequence = payload.sequence, "failed to push gossip");
            }
        }
    }

    debug!("heartbeat stopped");
}
