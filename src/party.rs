//! Parties: a phrase pushed through a chain of translations.
//!
//! [`generate_interesting_party`] keeps drawing seed phrases, routes and
//! translations until the final phrase has drifted far enough from the
//! original to make a decent puzzle.

use crate::language::{Language, LanguagePair};
use crate::route::{build_route, Route};
use crate::text::{ignore_word_order, normalise, similarity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seed phrases longer than this don't fit on the clue image
pub const MAX_SEED_CHARS: usize = 100;

/// Order-sensitive similarity must fall below this for a party to count
pub const MAX_ORDERED_SIMILARITY: f64 = 0.7;

/// Order-insensitive similarity must fall below this for a party to count
pub const MAX_UNORDERED_SIMILARITY: f64 = 0.9;

/// Supplies candidate seed phrases.
#[async_trait]
pub trait SeedPhraseSource: Send + Sync {
    async fn get(&self) -> Result<String>;
}

/// Translates text along one language pair.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, pair: &LanguagePair) -> Result<String>;
}

/// One step of a party: the phrase as it reads in `language`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub language: Language,
    pub text: String,
}

impl Step {
    pub fn new(language: Language, text: impl Into<String>) -> Self {
        Self {
            language,
            text: text.into(),
        }
    }
}

/// The full chain of translations, seed phrase first.
///
/// Always holds at least the seed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    steps: Vec<Step>,
}

impl Party {
    /// Wrap a list of steps; None if there are none
    pub fn from_steps(steps: Vec<Step>) -> Option<Self> {
        if steps.is_empty() {
            None
        } else {
            Some(Self { steps })
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    pub fn first(&self) -> &Step {
        &self.steps[0]
    }

    pub fn last(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }
}

/// Run `seed` through every hop of `route`, each hop translating the
/// previous hop's output.
pub async fn execute_chain(
    seed: &str,
    route: &Route,
    translator: &dyn Translator,
) -> Result<Party> {
    let start = route
        .start()
        .context("Cannot run a party along an empty route")?;
    let mut steps = Vec::with_capacity(route.len() + 1);
    steps.push(Step::new(start.clone(), seed));

    for pair in route.hops() {
        let previous = &steps[steps.len() - 1].text;
        let translated = translator
            .translate(previous, pair)
            .await
            .with_context(|| format!("Translation {} failed", pair))?;
        debug!("{}: {}", pair.destination.code(), translated);
        steps.push(Step::new(pair.destination.clone(), translated));
    }

    Ok(Party { steps })
}

/// Whether the drift between `original` and `result` makes a good puzzle.
///
/// The order-insensitive check stops punctuation and spacing changes
/// ("Pandemic Express" -> "Pandemic-Express") from passing. Its threshold is
/// looser because a reordering is interesting as long as something else
/// changed too.
pub fn is_interesting(original: &str, result: &str) -> bool {
    let original = normalise(original);
    let result = normalise(result);

    original != result
        && similarity(&original, &result) < MAX_ORDERED_SIMILARITY
        && similarity(&ignore_word_order(&original), &ignore_word_order(&result))
            < MAX_UNORDERED_SIMILARITY
}

#[derive(Debug, thiserror::Error)]
pub enum PartyError {
    #[error("gave up generating a party after {failures} consecutive failures")]
    TooManyFailures { failures: u32 },
}

/// Shape of the parties to generate
#[derive(Debug, Clone)]
pub struct PartyOptions {
    pub step_count: usize,
    pub start: Language,
    pub target: Language,
    /// Route Builder restart guard; None retries forever
    pub max_route_attempts: Option<u32>,
    /// Consecutive seed/translation failures tolerated before giving up
    pub max_failures: u32,
}

impl PartyOptions {
    pub fn new(step_count: usize, start: Language, target: Language) -> Self {
        Self {
            step_count,
            start,
            target,
            max_route_attempts: None,
            max_failures: 5,
        }
    }
}

/// Keep generating parties until one is interesting.
///
/// A seed phrase of [`MAX_SEED_CHARS`] or more is discarded and re-fetched.
/// A failing collaborator aborts only the current attempt; `max_failures`
/// attempts failing back to back end the loop with the last error.
/// Rejected parties don't count as failures. A route that can't be built is
/// a configuration problem and fails straight away.
pub async fn generate_interesting_party<R: Rng + Send>(
    options: &PartyOptions,
    seeds: &dyn SeedPhraseSource,
    translator: &dyn Translator,
    pairs: &[LanguagePair],
    rng: &mut R,
) -> Result<Party> {
    let mut failures: u32 = 0;

    loop {
        let attempt = match next_seed(seeds).await {
            Ok(seed) => {
                let route = build_route(
                    options.step_count,
                    &options.start,
                    &options.target,
                    pairs,
                    options.max_route_attempts,
                    rng,
                )
                .with_context(|| {
                    format!(
                        "No {}-step route from {} to {}",
                        options.step_count, options.start, options.target
                    )
                })?;
                execute_chain(&seed, &route, translator).await
            }
            Err(e) => Err(e),
        };

        match attempt {
            Ok(party) => {
                failures = 0;
                let original = &party.first().text;
                let result = &party.last().text;
                if is_interesting(original, result) {
                    info!("Accepted party: '{}' -> '{}'", original, result);
                    return Ok(party);
                }
                warn!("Rejected dull party: '{}' -> '{}'", original, result);
            }
            Err(e) => {
                failures += 1;
                if failures >= options.max_failures.max(1) {
                    return Err(e.context(PartyError::TooManyFailures { failures }));
                }
                warn!(
                    "Party attempt failed ({} of {} allowed): {:#}",
                    failures, options.max_failures, e
                );
            }
        }
    }
}

async fn next_seed(seeds: &dyn SeedPhraseSource) -> Result<String> {
    loop {
        let candidate = seeds.get().await.context("Failed to fetch a seed phrase")?;
        let length = candidate.chars().count();
        if length < MAX_SEED_CHARS {
            return Ok(candidate);
        }
        debug!("Seed phrase too long ({} chars), fetching another", length);
    }
}

/// Produces a fresh interesting party whenever a new game is due.
#[async_trait]
pub trait PartySource: Send + Sync {
    async fn generate(&self) -> Result<Party>;
}

/// Everything needed to produce a new party on demand.
#[derive(Clone)]
pub struct PartyGenerator {
    pub seeds: Arc<dyn SeedPhraseSource>,
    pub translator: Arc<dyn Translator>,
    pub pairs: Vec<LanguagePair>,
    pub options: PartyOptions,
}

#[async_trait]
impl PartySource for PartyGenerator {
    async fn generate(&self) -> Result<Party> {
        let mut rng = rand::rngs::StdRng::from_entropy();
        generate_interesting_party(
            &self.options,
            self.seeds.as_ref(),
            self.translator.as_ref(),
            &self.pairs,
            &mut rng,
        )
        .await
    }
}
