//! Seed phrases: names of reasonably well-known games from Giant Bomb.

use crate::party::SeedPhraseSource;
use crate::retry::{is_retryable_error, with_retry_if, ApiError, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

const SERVICE: &str = "Giant Bomb";

/// Games per page
const LIMIT: u64 = 100;

/// Descriptions shorter than this (as plain text) mark games nobody has heard of
const MIN_DESCRIPTION_CHARS: usize = 1000;

/// Pages to try before giving up on finding a notable game
const MAX_PAGES: u32 = 10;

const USER_AGENT: &str = "unshuffle-source-giantbomb/0.0";

#[derive(Debug, Deserialize)]
struct GamesResponse {
    #[serde(default)]
    number_of_total_results: u64,
    #[serde(default)]
    results: Vec<GameEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct GameEntry {
    id: u64,
    name: Option<String>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct GiantBombClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl GiantBombClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build Giant Bomb HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry: RetryConfig::api_call(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn games(&self, offset: Option<u64>) -> Result<GamesResponse> {
        let url = format!("{}/games/", self.base_url);
        let limit = LIMIT.to_string();
        let offset = offset.map(|o| o.to_string());

        with_retry_if(
            &self.retry,
            "Giant Bomb games",
            || async {
                let mut request = self.client.get(&url).query(&[
                    ("format", "json"),
                    ("limit", limit.as_str()),
                    ("sort", "id:asc"),
                    ("api_key", self.api_key.as_str()),
                ]);
                if let Some(offset) = &offset {
                    request = request.query(&[("offset", offset.as_str())]);
                }

                let response = request
                    .send()
                    .await
                    .context("Failed to send request to Giant Bomb")?;

                if !response.status().is_success() {
                    return Err(anyhow::Error::new(
                        ApiError::from_response(SERVICE, response).await,
                    ));
                }

                response
                    .json::<GamesResponse>()
                    .await
                    .context("Failed to parse Giant Bomb response")
            },
            is_retryable_error,
        )
        .await
    }

    /// One random page of games, shuffled
    async fn random_page(&self) -> Result<Vec<GameEntry>> {
        let total = self.games(None).await?.number_of_total_results;
        let offset = if total > LIMIT {
            rand::thread_rng().gen_range(0..total - LIMIT)
        } else {
            0
        };
        debug!("Drawing games at offset {} of {}", offset, total);

        let mut games = self.games(Some(offset)).await?.results;
        games.shuffle(&mut rand::thread_rng());
        Ok(games)
    }
}

#[async_trait]
impl SeedPhraseSource for GiantBombClient {
    async fn get(&self) -> Result<String> {
        for _ in 0..MAX_PAGES {
            let games = self.random_page().await?;
            if let Some(name) = pick_notable(&games) {
                return Ok(name);
            }
            debug!("No notable game on this page, drawing another");
        }
        anyhow::bail!("No notable game found in {} pages", MAX_PAGES)
    }
}

/// The first game with a name and a long enough description
fn pick_notable(games: &[GameEntry]) -> Option<String> {
    let mut seen = HashSet::new();
    games
        .iter()
        .filter(|game| seen.insert(game.id))
        .find(|game| {
            game.name.as_deref().is_some_and(|n| !n.trim().is_empty())
                && description_chars(game.description.as_deref()) >= MIN_DESCRIPTION_CHARS
        })
        .and_then(|game| game.name.as_deref())
        .map(collapse_spaces)
}

fn description_chars(html: Option<&str>) -> usize {
    let Some(html) = html else {
        return 0;
    };
    html2text::from_read(html.as_bytes(), 10_000)
        .map(|text| text.chars().count())
        .unwrap_or(0)
}

fn collapse_spaces(name: &str) -> String {
    let mut collapsed = name.to_string();
    while collapsed.contains("  ") {
        collapsed = collapsed.replace("  ", " ");
    }
    collapsed
}
