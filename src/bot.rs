//! Wiring: the concrete collaborators built from configuration.

use crate::config::Config;
use crate::giantbomb::GiantBombClient;
use crate::language::{resolve_language, LanguageCatalog};
use crate::libretranslate::LibreTranslateClient;
use crate::party::{Party, PartyGenerator, PartyOptions, PartySource};
use crate::session::{run_cycle, CycleOutcome, Host};
use crate::store::SessionStore;
use crate::twitter::TwitterClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Build a party generator backed by Giant Bomb and LibreTranslate.
///
/// The start and target languages are checked against what the translator
/// offers, so a typo in the configuration fails here rather than in the
/// route builder.
pub async fn party_generator(config: &Config, client: reqwest::Client) -> Result<PartyGenerator> {
    let translator = LibreTranslateClient::new(
        client,
        &config.libretranslate_url,
        config.libretranslate_api_key.clone(),
    );
    let seeds = GiantBombClient::new(&config.giantbomb_api_url, &config.giantbomb_api_key)?;

    let start = resolve_language(&translator, &config.start_language).await?;
    let target = resolve_language(&translator, &config.target_language).await?;
    let pairs = translator
        .pairs()
        .await
        .context("Failed to load language pairs")?;
    info!(
        "Translator offers {} pairs; routes run {} -> {} in {} steps",
        pairs.len(),
        start,
        target,
        config.step_count
    );

    let mut options = PartyOptions::new(config.step_count, start, target);
    options.max_route_attempts = config.max_route_attempts;
    options.max_failures = config.max_generation_failures;

    Ok(PartyGenerator {
        seeds: Arc::new(seeds),
        translator: Arc::new(translator),
        pairs,
        options,
    })
}

/// Builds the party generator on first use.
///
/// Resuming or timing out a game never touches the translator, so an outage
/// there only blocks starting the next game.
struct LazyGenerator {
    config: Config,
    client: reqwest::Client,
    generator: OnceCell<PartyGenerator>,
}

#[async_trait]
impl PartySource for LazyGenerator {
    async fn generate(&self) -> Result<Party> {
        let generator = self
            .generator
            .get_or_try_init(|| party_generator(&self.config, self.client.clone()))
            .await?;
        generator.generate().await
    }
}

/// Everything one poll cycle needs.
pub struct Bot {
    platform: TwitterClient,
    store: SessionStore,
    parties: LazyGenerator,
    handle: String,
    game_duration: chrono::Duration,
}

impl Bot {
    pub fn from_config(config: &Config) -> Result<Self> {
        let twitter = config.twitter()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let store = SessionStore::new(&config.database_path)?;
        let handle = twitter.handle.clone();

        Ok(Self {
            platform: TwitterClient::new(client.clone(), twitter),
            store,
            parties: LazyGenerator {
                config: config.clone(),
                client,
                generator: OnceCell::new(),
            },
            handle,
            game_duration: config.game_duration(),
        })
    }

    /// Resume or start a game as of `now`
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        // No image renderer is wired up; posts go out as text
        let host = Host::new(&self.platform, None, &self.store, &self.handle)?;
        run_cycle(&host, &self.parties, self.game_duration, now).await
    }
}
