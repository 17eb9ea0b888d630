//! Text comparison helpers shared by the interestingness filter and scoring.

/// Fold the differences people can't be expected to type: curly quotes,
/// three dots vs. an ellipsis, case, and `é`.
pub fn normalise(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace("...", "\u{2026}")
        .to_lowercase()
        .replace('\u{e9}', "e")
}

/// The words of `text` (split on single spaces), sorted and rejoined
pub fn ignore_word_order(text: &str) -> String {
    let mut words: Vec<&str> = text.split(' ').collect();
    words.sort_unstable();
    words.join(" ")
}

/// Normalized edit similarity in `[0, 1]`; 1 means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
