//! LibreTranslate client: the translator and the language catalogue.

use crate::language::{Language, LanguageCatalog, LanguagePair};
use crate::party::Translator;
use crate::retry::{is_retryable_error, with_retry_if, ApiError, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "LibreTranslate";

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    code: String,
    name: String,
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Clone)]
pub struct LibreTranslateClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    translate_retry: RetryConfig,
    catalog_retry: RetryConfig,
}

impl LibreTranslateClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            translate_retry: RetryConfig::translation(),
            catalog_retry: RetryConfig::api_call(),
        }
    }

    /// Use the same retry policy for every call
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.translate_retry = retry.clone();
        self.catalog_retry = retry;
        self
    }

    async fn fetch_languages(&self) -> Result<Vec<LanguageEntry>> {
        let url = format!("{}/languages", self.base_url);

        with_retry_if(
            &self.catalog_retry,
            "LibreTranslate languages",
            || async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .context("Failed to send request to LibreTranslate")?;

                if !response.status().is_success() {
                    return Err(anyhow::Error::new(
                        ApiError::from_response(SERVICE, response).await,
                    ));
                }

                response
                    .json::<Vec<LanguageEntry>>()
                    .await
                    .context("Failed to parse LibreTranslate languages")
            },
            is_retryable_error,
        )
        .await
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, text: &str, pair: &LanguagePair) -> Result<String> {
        if pair.source == pair.destination {
            return Ok(text.to_string());
        }

        let url = format!("{}/translate", self.base_url);
        let request = TranslateRequest {
            q: text,
            source: pair.source.code(),
            target: pair.destination.code(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let translated = with_retry_if(
            &self.translate_retry,
            &format!("Translation {}", pair),
            || async {
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .context("Failed to send translation request to LibreTranslate")?;

                if !response.status().is_success() {
                    return Err(anyhow::Error::new(
                        ApiError::from_response(SERVICE, response).await,
                    ));
                }

                let body: TranslateResponse = response
                    .json()
                    .await
                    .context("Failed to parse LibreTranslate translation")?;
                Ok(body.translated_text)
            },
            is_retryable_error,
        )
        .await?;

        debug!("{}: '{}' -> '{}'", pair, text, translated);
        Ok(translated)
    }
}

#[async_trait]
impl LanguageCatalog for LibreTranslateClient {
    async fn languages(&self) -> Result<Vec<Language>> {
        let mut languages: Vec<Language> = self
            .fetch_languages()
            .await?
            .into_iter()
            .map(|entry| Language::new(entry.code, entry.name))
            .collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn pairs(&self) -> Result<Vec<LanguagePair>> {
        let entries = self.fetch_languages().await?;
        let languages: Vec<Language> = entries
            .iter()
            .map(|entry| Language::new(entry.code.clone(), entry.name.clone()))
            .collect();

        let mut pairs = Vec::new();
        for entry in &entries {
            let source = Language::new(entry.code.clone(), entry.name.clone());
            for target in &entry.targets {
                // Names for targets come from their own entry where there is one
                let destination = languages
                    .iter()
                    .find(|language| language.code() == target)
                    .cloned()
                    .unwrap_or_else(|| Language::from_code(target));
                pairs.push(LanguagePair::new(source.clone(), destination));
            }
        }
        pairs.sort();
        pairs.dedup();

        debug!(
            "LibreTranslate offers {} languages, {} pairs",
            languages.len(),
            pairs.len()
        );
        Ok(pairs)
    }
}
