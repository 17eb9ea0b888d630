//! Generate one interesting party and print every step.
//!
//! Usage:
//!   cargo run --bin party
//!
//! Required environment variables:
//! - GIANTBOMB_API_KEY
//!
//! Optional:
//! - LIBRETRANSLATE_URL (defaults to http://localhost:5000)
//! - STEP_COUNT, START_LANGUAGE, TARGET_LANGUAGE

use anyhow::Result;
use unshuffle::bot::party_generator;
use unshuffle::config::Config;
use unshuffle::party::PartySource;

#[tokio::main]
async fn main() -> Result<()> {
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
    let party = generator.generate().await?;

    for step in party.steps() {
        println!("{}: {}", step.language.code(), step.text);
    }

    Ok(())
}
