//! Local fuzzy matching against the cached substance list.
//!
//! Scores run 0–100: exact 100, prefix 90, substring 80, otherwise an
//! edit-distance similarity scaled to at most 70.

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::models::{Substance, SubstanceType};

/// Minimum score to be offered as a suggestion.
pub const MIN_FUZZY_SCORE: u8 = 40;

/// Number of fuzzy suggestions returned.
pub const MAX_FUZZY_RESULTS: usize = 5;

/// A substance with its fuzzy score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredSubstance {
    pub substance: Substance,
    pub score: u8,
}

/// Score `target` against `query`.
pub fn fuzzy_score(query: &str, target: &str) -> u8 {
    let q = query.trim().to_lowercase();
    let t = target.trim().to_lowercase();

    if q == t {
        return 100;
    }
    if q.is_empty() {
        return 0;
    }
    if t.starts_with(&q) {
        return 90;
    }
    if t.contains(&q) {
        return 80;
    }

    let distance = levenshtein(&q, &t);
    let max_len = q.chars().count().max(t.chars().count());
    let similarity = 1.0 - distance as f64 / max_len as f64;

    (similarity * 70.0).floor().clamp(0.0, 70.0) as u8
}

/// Best score over every name the substance answers to.
pub fn substance_score(query: &str, substance: &Substance) -> u8 {
    substance
        .names()
        .map(|name| fuzzy_score(query, name))
        .max()
        .unwrap_or(0)
}

/// Fuzzy matcher with configurable threshold and result count.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    pub min_score: u8,
    pub limit: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            min_score: MIN_FUZZY_SCORE,
            limit: MAX_FUZZY_RESULTS,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(min_score: u8, limit: usize) -> Self {
        Self { min_score, limit }
    }

    /// Score every candidate of the requested kind, drop those below the
    /// threshold, sort descending and truncate.
    ///
    /// Linear scan; fine for catalogs in the thousands.
    pub fn matches(
        &self,
        query: &str,
        candidates: &[Substance],
        kind: Option<SubstanceType>,
    ) -> Vec<ScoredSubstance> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredSubstance> = candidates
            .iter()
            .filter(|s| s.matches_kind(kind))
            .map(|s| ScoredSubstance {
                score: substance_score(query, s),
                substance: s.clone(),
            })
            .filter(|c| c.score >= self.min_score)
            .collect();

        // Stable sort keeps catalog order among equal scores
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(self.limit);
        scored
    }
}
