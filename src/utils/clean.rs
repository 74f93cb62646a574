use std::{sync::Arc, time::Duration};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::room::Rooms;

pub const GC_PERIOD: Duration = Duration::from_millis(5000);

/// Sweeps idle rooms every [`GC_PERIOD`] until `cancel` fires.
///
/// The first sweep runs right away. A sweep in progress is never cut short:
/// cancellation is only observed between sweeps.
pub async fn task(rooms: Arc<Rooms>, cancel: CancellationToken) {
    let mut tick = time::interval(GC_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        let removed = rooms.gc().await;
        if removed > 0 {
            let left = rooms.room_count().await;
            debug!(removed, left, "swept idle rooms");
        }
    }
    debug!("room gc stopped");
}
