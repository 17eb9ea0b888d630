use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Giant Bomb (seed phrases)
    pub giantbomb_api_key: String,
    pub giantbomb_api_url: String,

    // LibreTranslate
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,

    // Twitter (only needed by the bot binaries)
    pub twitter_access_token: Option<String>,
    pub twitter_user_id: Option<String>,
    pub twitter_handle: Option<String>,
    pub twitter_api_url: String,

    // Persistence
    pub database_path: String,

    // Game
    pub game_duration_minutes: i64,
    pub step_count: usize,
    pub start_language: String,
    pub target_language: String,
    pub max_route_attempts: Option<u32>,
    pub max_generation_failures: u32,

    // Scheduler
    pub poll_schedule: String,
}

/// Everything needed to talk to the game account.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub access_token: String,
    pub user_id: String,
    pub handle: String,
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            giantbomb_api_key: std::env::var("GIANTBOMB_API_KEY")
                .context("GIANTBOMB_API_KEY not set")?,
            giantbomb_api_url: std::env::var("GIANTBOMB_API_URL")
                .unwrap_or_else(|_| "https://www.giantbomb.com/api".to_string()),

            libretranslate_url: std::env::var("LIBRETRANSLATE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            libretranslate_api_key: std::env::var("LIBRETRANSLATE_API_KEY").ok(),

            twitter_access_token: std::env::var("TWITTER_ACCESS_TOKEN").ok(),
            twitter_user_id: std::env::var("TWITTER_USER_ID").ok(),
            twitter_handle: std::env::var("TWITTER_HANDLE")
                .ok()
                .map(|h| h.trim_start_matches('@').to_string()),
            twitter_api_url: std::env::var("TWITTER_API_URL")
                .unwrap_or_else(|_| "https://api.twitter.com".to_string()),

            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/unshuffle.db".to_string()),

            game_duration_minutes: std::env::var("GAME_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            step_count: std::env::var("STEP_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            start_language: std::env::var("START_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            target_language: std::env::var("TARGET_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            max_route_attempts: std::env::var("MAX_ROUTE_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_generation_failures: std::env::var("MAX_GENERATION_FAILURES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            poll_schedule: std::env::var("POLL_SCHEDULE")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
        })
    }

    /// Twitter settings, failing if any of the account variables is missing
    pub fn twitter(&self) -> Result<TwitterCredentials> {
        Ok(TwitterCredentials {
            access_token: self
                .twitter_access_token
                .clone()
                .context("TWITTER_ACCESS_TOKEN not set")?,
            user_id: self
                .twitter_user_id
                .clone()
                .context("TWITTER_USER_ID not set")?,
            handle: self
                .twitter_handle
                .clone()
                .context("TWITTER_HANDLE not set")?,
            api_url: self.twitter_api_url.clone(),
        })
    }

    /// Falls back to an hour when the configured minutes overflow a duration
    pub fn game_duration(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.game_duration_minutes)
            .unwrap_or_else(|| chrono::Duration::minutes(60))
    }
}
