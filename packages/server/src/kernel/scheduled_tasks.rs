//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! - Stale challenge sweep: deletes consumed and expired challenges
//!
//! Correctness never depends on the sweep; verification already filters
//! on `consumed` and `expires_at`. It only bounds table growth.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::kernel::{BaseChallengeStore, BaseClock};

/// Default sweep cadence: at second 0 of every minute
pub const DEFAULT_SWEEP_SCHEDULE: &str = "0 * * * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(
    store: Arc<dyn BaseChallengeStore>,
    clock: Arc<dyn BaseClock>,
    sweep_schedule: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async(sweep_schedule, move |_uuid, _lock| {
        let store = store.clone();
        let clock = clock.clone();
        Box::pin(async move {
            if let Err(e) = run_sweep(store.as_ref(), clock.as_ref()).await {
                tracing::error!("Challenge sweep failed: {}", e);
            }
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %sweep_schedule, "Scheduled tasks started (stale challenge sweep)");
    Ok(scheduler)
}

/// Delete every challenge that can no longer be verified
pub async fn run_sweep(store: &dyn BaseChallengeStore, clock: &dyn BaseClock) -> Result<u64> {
    let purged = store.purge_stale(clock.now()).await?;
    if purged > 0 {
        tracing::info!(purged, "Purged stale challenges");
    } else {
        tracing::debug!("No stale challenges to purge");
    }
    Ok(purged)
}
