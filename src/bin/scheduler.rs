//! Long-running bot: polls the current game on a cron schedule.
//!
//! Usage:
//!   cargo run --bin scheduler
//!
//! Required environment variables:
//! - GIANTBOMB_API_KEY
//! - TWITTER_ACCESS_TOKEN, TWITTER_USER_ID, TWITTER_HANDLE
//!
//! Optional:
//! - POLL_SCHEDULE (defaults to every five minutes)
//! - see `Config::from_env` for the rest

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use unshuffle::bot::Bot;
use unshuffle::config::Config;
use unshuffle::scheduler::start_scheduler;
use unshuffle::shutdown::install_signal_handler;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("unshuffle=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let bot = Arc::new(Bot::from_config(&config)?);
    let shutdown = install_signal_handler();

    let mut scheduler = start_scheduler(bot, &config.poll_schedule).await?;

    shutdown.cancelled().await;
    scheduler.shutdown().await?;
    info!("Scheduler stopped");

    Ok(())
}
