//! Background eviction of expired guard state

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::StoreError;

/// Shortest period a sweeper runs at; `tokio::time::interval` panics on zero
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Result of one sweep cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub remaining: usize,
}

/// Running sweeper tasks
///
/// Dropping the handle leaves the tasks running until the runtime stops;
/// call [`shutdown`](Self::shutdown) to stop them deterministically.
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandle {
    pub(crate) fn new(token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { token, tasks }
    }

    /// Token that stops every sweeper when cancelled
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the sweepers and wait for them to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }
        info!("Sweepers stopped");
    }
}

/// Run `sweep` every `period` until `token` is cancelled
///
/// The first sweep happens one full period after spawning. A failed sweep is
/// logged and retried on the next tick.
pub(crate) fn spawn_sweeper<F>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn() -> Result<SweepStats, StoreError> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timer.tick().await;

        info!(sweeper = name, period_ms = period.as_millis() as u64, "Sweeper started");

        loop {
            tokio::select! {
                _ = timer.tick() => match sweep() {
                    Ok(stats) => debug!(
                        sweeper = name,
                        removed = stats.removed,
                        remaining = stats.remaining,
                        "Sweep complete"
                    ),
                    Err(e) => warn!(sweeper = name, error = %e, "Sweep failed, retrying next tick"),
                },
                _ = token.cancelled() => {
                    debug!(sweeper = name, "Sweeper cancelled");
                    break;
                }
            }
        }
    })
}
