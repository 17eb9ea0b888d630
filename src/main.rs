use anyhow::Result;
use chrono::Utc;
use tracing::info;
use unshuffle::bot::Bot;
use unshuffle::config::Config;
use unshuffle::session::CycleOutcome;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("unshuffle=info".parse()?),
        )
        .init();

    info!("Starting unshuffle poll cycle");

    let config = Config::from_env()?;
    let bot = Bot::from_config(&config)?;

    match bot.run_cycle(Utc::now()).await? {
        CycleOutcome::Created { thread_root_id } => {
            info!("Published a new game as {}", thread_root_id);
        }
        CycleOutcome::Resumed {
            thread_root_id,
            poll,
        } => {
            info!("Polled game {}: {:?}", thread_root_id, poll);
        }
    }

    Ok(())
}
