use crate::bot::Bot;
use crate::session::CycleOutcome;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Initialize and start the scheduler.
///
/// Cycles never overlap: a tick that fires while the previous cycle is still
/// running is skipped.
pub async fn start_scheduler(bot: Arc<Bot>, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let running = Arc::new(Mutex::new(()));

    info!("Scheduling poll cycles (cron: {})", schedule);

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let bot = Arc::clone(&bot);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                warn!("Previous poll cycle still running, skipping this tick");
                return;
            };
            if let Err(e) = run_scheduled_cycle(&bot).await {
                error!("Scheduled poll cycle failed: {:#}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("✓ Scheduler started");

    Ok(scheduler)
}

async fn run_scheduled_cycle(bot: &Bot) -> Result<()> {
    match bot.run_cycle(Utc::now()).await? {
        CycleOutcome::Created { thread_root_id } => {
            info!("Started game {}", thread_root_id)
        }
        CycleOutcome::Resumed {
            thread_root_id,
            poll,
        } => info!("Polled game {}: {:?}", thread_root_id, poll),
    }
    Ok(())
}
