//! Play one game locally on the terminal.
//!
//! Usage:
//!   cargo run --bin play
//!
//! Required environment variables:
//! - GIANTBOMB_API_KEY
//!
//! Optional:
//! - LIBRETRANSLATE_URL (defaults to http://localhost:5000)
//! - STEP_COUNT, START_LANGUAGE, TARGET_LANGUAGE

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::info;
use unshuffle::bot::party_generator;
use unshuffle::config::Config;
use unshuffle::party::PartySource;
use unshuffle::game::{play_interactive, Game, PlayOutcome};
use unshuffle::shutdown::install_signal_handler;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(run());
    // A pending stdin read occupies a blocking thread that would otherwise hold up exit
    runtime.shutdown_background();
    result
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("unshuffle=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let generator = party_generator(&config, reqwest::Client::new()).await?;

    info!("Generating a party, this can take a while");
    let game = Game::new(generator.generate().await?);

    let cancel = install_signal_handler();
    let outcome = play_interactive(
        &game,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
    )
    .await?;

    match outcome {
        PlayOutcome::Solved { guesses } => info!("Solved in {} guesses", guesses),
        PlayOutcome::Abandoned { guesses } => info!("Gave up after {} guesses", guesses),
    }
    Ok(())
}
