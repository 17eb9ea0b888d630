//! Random fixed-length walks through the language pair graph.

use crate::language::{Language, LanguagePair};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("a route needs at least one step")]
    ZeroSteps,
    #[error("no route found after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// A walk of language pairs where each hop starts where the previous one ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    hops: Vec<LanguagePair>,
}

impl Route {
    pub fn hops(&self) -> &[LanguagePair] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Where the walk begins (None only for an empty route)
    pub fn start(&self) -> Option<&Language> {
        self.hops.first().map(|pair| &pair.source)
    }

    pub fn end(&self) -> Option<&Language> {
        self.hops.last().map(|pair| &pair.destination)
    }
}

/// Build a random route through the translator with exactly `step_count`
/// hops, starting at `start` and ending at `target`.
///
/// Each hop is picked uniformly among the pairs leaving the current
/// language; the last hop is restricted to pairs arriving at `target`.
/// Hitting a dead end throws the whole partial walk away and starts again
/// from `start`. With `max_attempts` unset this only returns once a route is
/// found, so the graph must actually contain one.
pub fn build_route<R: Rng + ?Sized>(
    step_count: usize,
    start: &Language,
    target: &Language,
    pairs: &[LanguagePair],
    max_attempts: Option<u32>,
    rng: &mut R,
) -> Result<Route, RouteError> {
    if step_count == 0 {
        return Err(RouteError::ZeroSteps);
    }

    let mut attempts: u32 = 0;

    loop {
        if let Some(limit) = max_attempts {
            if attempts >= limit {
                return Err(RouteError::Exhausted { attempts });
            }
        }
        attempts = attempts.saturating_add(1);

        if let Some(hops) = walk(step_count, start, target, pairs, rng) {
            debug!(
                "Built {}-step route {} -> {} after {} attempt(s)",
                step_count,
                start.code(),
                target.code(),
                attempts
            );
            return Ok(Route { hops });
        }
    }
}

/// One greedy walk; None on a dead end
fn walk<R: Rng + ?Sized>(
    step_count: usize,
    start: &Language,
    target: &Language,
    pairs: &[LanguagePair],
    rng: &mut R,
) -> Option<Vec<LanguagePair>> {
    let mut current = start;
    let mut hops: Vec<LanguagePair> = Vec::with_capacity(step_count);

    for n in 0..step_count {
        let last_step = n == step_count - 1;
        let options: Vec<&LanguagePair> = pairs
            .iter()
            .filter(|pair| &pair.source == current)
            .filter(|pair| !last_step || &pair.destination == target)
            .collect();

        let chosen: &LanguagePair = options.choose(rng).copied()?;
        hops.push(chosen.clone());
        current = &chosen.destination;
    }

    Some(hops)
}
