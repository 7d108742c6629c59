//! Background stale-eviction sweep for the agent-instance cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use agentry_core::engine::cache::AgentCache;

/// Periodically evict idle engines until `cancel` fires.
///
/// The first sweep runs one full `every` after spawning.
pub fn spawn_eviction_sweeper(
    cache: Arc<AgentCache>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("eviction sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = cache.evict_stale().await;
                    if evicted > 0 {
                        tracing::info!(evicted, "evicted stale agent engines");
                    }
                }
            }
        }
    })
}
