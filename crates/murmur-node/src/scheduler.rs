//! Periodic peer discovery.
//!
//! The scheduler owns at most one background loop. Each tick of the loop
//! runs one [`DiscoveryRound`]; the first tick fires one interval after
//! start. Stopping cancels the loop, abandons a round in progress and waits
//! for the task to exit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One unit of discovery work.
#[async_trait]
pub trait DiscoveryRound: Send + Sync + 'static {
    /// Run a round and return the number of peers it found.
    async fn run_round(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

struct RunningLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Start/stop control for the discovery loop.
///
/// Both operations take the same lock, so a start racing a stop sees either
/// the old loop or none.
#[derive(Default)]
pub struct DiscoveryScheduler {
    running: Mutex<Option<RunningLoop>>,
}

impl DiscoveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the loop. Returns `false` without doing anything when a loop is
    /// already running.
    pub async fn start<R: DiscoveryRound>(&self, interval: Duration, round: Arc<R>) -> bool {
        let mut running = self.running.lock().await;
        if let Some(existing) = running.as_ref() {
            if !existing.task.is_finished() {
                debug!("peer discovery attempted to start, but was already running");
                return false;
            }
        }

        info!(interval_secs = interval.as_secs(), "peer discovery is starting");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(discovery_loop(interval, round, cancel.clone()));
        *running = Some(RunningLoop { cancel, task });
        true
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// Returns immediately when nothing is running; calling it twice is fine.
    /// Once this returns no further rounds run.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("peer discovery stop requested, but it was not running");
            return;
        };

        debug!("peer discovery is stopping");
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            if e.is_panic() {
                error!(error = %e, "peer discovery loop panicked");
            }
        }
    }

    pub async fn state(&self) -> SchedulerState {
        match self.running.lock().await.as_ref() {
            Some(running) if !running.task.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }
}

impl Drop for DiscoveryScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
            running.task.abort();
        }
    }
}

async fn discovery_loop<R: DiscoveryRound>(
    period: Duration,
    round: Arc<R>,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("discovery round abandoned");
                break;
            }
            found = round.run_round() => found,
        };
        debug!(peers = found, "discovered {} peers", found);
    }

    info!("peer discovery stopped");
}
