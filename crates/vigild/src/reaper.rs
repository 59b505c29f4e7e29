use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vigil_core::LivenessEngine;

/// Periodically drop sessions that have outlived the session timeout.
///
/// Sessions are also evicted lazily on access; the sweep reclaims ids that
/// clients abandoned and never touched again.
pub fn spawn_reaper(engine: Arc<LivenessEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let reaped = engine.reap_expired();
            if reaped > 0 {
                tracing::info!(
                    reaped,
                    remaining = engine.session_count(),
                    "expired sessions reclaimed"
                );
            }
        }
    })
}
