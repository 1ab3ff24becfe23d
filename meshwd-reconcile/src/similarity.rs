//! Fuzzy string similarity for candidate scoring
//!
//! Token-sort ratio: both strings are lowercased, split on whitespace, the
//! tokens sorted and re-joined, then compared with normalized Levenshtein
//! similarity. Word order and case do not affect the score, so
//! "Mellitus, Diabetes" and "diabetes mellitus," only differ by punctuation.

use crate::types::{Candidate, Keyword};

/// Highest possible score
pub const MAX_SCORE: f64 = 100.0;

/// Canonical form used for comparison
pub fn token_sort_key(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity of two strings on a 0-100 scale
///
/// Strings that are equal ignoring case and whitespace score exactly 100.
/// An empty (or all-whitespace) side scores 0.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a = token_sort_key(a);
    let b = token_sort_key(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return MAX_SCORE;
    }

    (strsim::normalized_levenshtein(&a, &b) * MAX_SCORE).clamp(0.0, MAX_SCORE)
}

/// Score a candidate: best of its label and aliases
pub fn score_candidate(keyword: &Keyword, candidate: &Candidate) -> f64 {
    std::iter::once(candidate.label.as_str())
        .chain(candidate.aliases.iter().map(String::as_str))
        .map(|name| token_sort_ratio(keyword.as_str(), name))
        .fold(0.0, f64::max)
}
