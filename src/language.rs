//! Languages and the directed graph of translatable language pairs.
//!
//! A [`Language`] is identified by its code alone; the display name is
//! carried along for rendering and logging. Names come from the catalogue
//! when one is available, otherwise from a small table of well-known codes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Display names for the languages Argos/LibreTranslate ship models for.
const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("az", "Azerbaijani"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sv", "Swedish"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("zh", "Chinese"),
];

/// A language a translation provider knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    code: String,
    name: String,
}

impl Language {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Build a language from its code, naming it from the well-known table.
    ///
    /// Unknown codes are named after the code itself.
    pub fn from_code(code: &str) -> Self {
        let name = KNOWN_LANGUAGES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, name)| *name)
            .unwrap_or(code);
        Self::new(code, name)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Language {}

impl Hash for Language {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl PartialOrd for Language {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Language {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// "Translation from `source` to `destination` is supported."
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguagePair {
    pub source: Language,
    pub destination: Language,
}

impl LanguagePair {
    pub fn new(source: Language, destination: Language) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Every ordered pair over `languages`, self-pairs included
    pub fn all_between(languages: &[Language]) -> Vec<LanguagePair> {
        languages
            .iter()
            .flat_map(|source| {
                languages
                    .iter()
                    .map(move |destination| LanguagePair::new(source.clone(), destination.clone()))
            })
            .collect()
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.code, self.destination.code)
    }
}

/// Source of the languages and language pairs a translator supports.
///
/// Pairs are returned as a list so that random choices over them are
/// reproducible for a seeded generator.
#[async_trait]
pub trait LanguageCatalog: Send + Sync {
    async fn languages(&self) -> Result<Vec<Language>>;

    async fn pairs(&self) -> Result<Vec<LanguagePair>>;
}

/// Look up a language by code in the catalogue
pub async fn resolve_language(catalog: &dyn LanguageCatalog, code: &str) -> Result<Language> {
    catalog
        .languages()
        .await?
        .into_iter()
        .find(|language| language.code == code)
        .with_context(|| format!("Language '{}' is not offered by the translator", code))
}

/// A fixed set of pairs held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    pairs: Vec<LanguagePair>,
}

impl StaticCatalog {
    pub fn new(pairs: Vec<LanguagePair>) -> Self {
        Self { pairs }
    }

    /// Every language can be translated into every other (and itself)
    pub fn fully_connected(languages: &[Language]) -> Self {
        Self::new(LanguagePair::all_between(languages))
    }
}

#[async_trait]
impl LanguageCatalog for StaticCatalog {
    async fn languages(&self) -> Result<Vec<Language>> {
        let mut languages: Vec<Language> = self
            .pairs
            .iter()
            .flat_map(|pair| [pair.source.clone(), pair.destination.clone()])
            .collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn pairs(&self) -> Result<Vec<LanguagePair>> {
        Ok(self.pairs.clone())
    }
}
