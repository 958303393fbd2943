use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::registry::SocketRegistry;

/// Runs `sweep_liveness` every `interval` until the task is aborted.
pub(crate) fn spawn_liveness_sweep(
    registry: Arc<SocketRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so fresh sockets get a full interval.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = registry.sweep_liveness().await;
            if report.terminated > 0 || report.pinged > 0 {
                tracing::debug!(
                    event = "gateway.liveness.sweep",
                    pinged = report.pinged,
                    terminated = report.terminated,
                );
            }
        }
    })
}
