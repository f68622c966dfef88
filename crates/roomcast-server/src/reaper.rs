//! Periodic removal of rooms that were created but never joined.

use crate::metrics;
use roomcast_core::RoomRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawn the sweeper task.
pub fn spawn_reaper(registry: Arc<RoomRegistry>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let removed = registry.prune_unjoined(ttl);
            if removed > 0 {
                debug!(rooms = removed, "Reaped unjoined rooms");
                metrics::record_rooms_reaped(removed);
            }
            metrics::set_active_rooms(registry.room_count());
        }
    })
}
