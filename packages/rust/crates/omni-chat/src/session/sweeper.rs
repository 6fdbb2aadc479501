//! Background idle-session eviction.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::observability::SessionEvent;

use super::store::SessionStore;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running sweeper task. Dropping it without `stop` leaves the task running until
/// the runtime shuts down.
pub struct IdleSweeper {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl IdleSweeper {
    /// Signal the task and wait for it to finish its current pass.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(error) = self.handle.await {
            tracing::warn!(error = %error, "idle session sweeper task ended abnormally");
        }
    }
}

/// Spawn a task that evicts sessions idle for longer than `max_idle`, every `interval`.
#[must_use]
pub fn spawn_idle_sweeper(
    store: SessionStore,
    max_idle: Duration,
    interval: Duration,
) -> IdleSweeper {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        tracing::info!(
            event = SessionEvent::SessionSweeperStarted.as_str(),
            max_idle_secs = max_idle.as_secs(),
            interval_ms = interval.as_millis(),
            "idle session sweeper started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let evicted = store.evict_idle(Utc::now(), max_idle);
                    if !evicted.is_empty() {
                        tracing::info!(
                            event = SessionEvent::SessionSweepCompleted.as_str(),
                            evicted = evicted.len(),
                            remaining = store.len(),
                            "idle sessions evicted"
                        );
                    }
                }
            }
        }
        tracing::info!(
            event = SessionEvent::SessionSweeperStopped.as_str(),
            "idle session sweeper stopped"
        );
    });
    IdleSweeper {
        stop_tx: Some(stop_tx),
        handle,
    }
}
