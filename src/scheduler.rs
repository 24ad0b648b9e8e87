// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::Pipeline;

/// Spawn the in-process recurring trigger. Each tick runs the same scan-and-deliver
/// call as the cron endpoint; failures are logged and the loop keeps going.
/// The first run happens one full interval after startup.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp().max(0);
            gauge!("brief_scheduler_last_run_ts").set(now as f64);

            match pipeline.run_scan_and_deliver().await {
                Ok(summary) => tracing::info!(
                    target: "cron",
                    items = summary.item_count,
                    to = %summary.sent_to,
                    "scheduled brief delivered"
                ),
                Err(e) => tracing::warn!(
                    target: "cron",
                    error = %e,
                    "scheduled brief failed"
                ),
            }
        }
    })
}
