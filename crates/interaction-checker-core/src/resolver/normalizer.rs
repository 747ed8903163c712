//! Substance name normalization.
//!
//! Handles:
//! - Lookup tokens (must agree with the server-side `norm_token` function)
//! - Autocomplete prefixes (alphanumerics only)
//! - Brand name expansion (Tylenol→acetaminophen, Coumadin→warfarin)

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Substance;

/// Normalized key used for pairwise interaction lookup.
///
/// Two substances share a token exactly when their canonical names
/// normalize to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupToken(String);

impl LookupToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LookupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LookupToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize text into a lookup token.
///
/// Lowercase, trim, drop everything except ASCII word characters,
/// whitespace and hyphens, collapse whitespace runs to one space.
pub fn normalize_token(input: &str) -> LookupToken {
    let lower = input.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_space = false;

    for c in lower.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    LookupToken(out)
}

/// Normalize a query into the prefix form the autocomplete index stores:
/// lowercase ASCII alphanumerics only.
pub fn autocomplete_prefix(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Find the substance whose display name, canonical name or any alias
/// normalizes to the same token as `input`.
pub fn find_by_token<'a>(input: &str, substances: &'a [Substance]) -> Option<&'a Substance> {
    let wanted = normalize_token(input);
    if wanted.is_empty() {
        return None;
    }
    substances
        .iter()
        .find(|s| s.names().any(|name| normalize_token(name) == wanted))
}

/// Brand name expansion.
pub struct Normalizer {
    /// Alias map: brand/spoken name token → canonical name
    aliases: HashMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with the default brand packs.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }

    /// Create a normalizer with no aliases.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Expand a brand name to its canonical name. Unknown names pass
    /// through as their lookup token.
    pub fn expand_alias(&self, name: &str) -> String {
        let token = normalize_token(name).into_string();
        self.aliases.get(&token).cloned().unwrap_or(token)
    }

    /// Canonical name for a brand, if this is a known brand.
    pub fn brand(&self, name: &str) -> Option<&str> {
        self.aliases
            .get(normalize_token(name).as_str())
            .map(String::as_str)
    }

    /// Brands whose normalized name starts with `prefix`.
    pub fn brands_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let prefix = normalize_token(prefix).into_string();
        self.aliases
            .iter()
            .filter(move |(brand, _)| !prefix.is_empty() && brand.starts_with(&prefix))
            .map(|(b, c)| (b.as_str(), c.as_str()))
    }

    /// Every (brand, canonical) pair.
    pub fn brands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(b, c)| (b.as_str(), c.as_str()))
    }

    /// Add a custom alias mapping.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases.insert(
            normalize_token(alias).into_string(),
            normalize_token(canonical).into_string(),
        );
    }

    /// Default brand name mappings.
    fn default_aliases() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Analgesics
        map.insert("tylenol".into(), "acetaminophen".into());
        map.insert("panadol".into(), "acetaminophen".into());
        map.insert("paracetamol".into(), "acetaminophen".into());
        map.insert("advil".into(), "ibuprofen".into());
        map.insert("motrin".into(), "ibuprofen".into());
        map.insert("aleve".into(), "naproxen".into());
        map.insert("bayer".into(), "aspirin".into());

        // Anticoagulants
        map.insert("coumadin".into(), "warfarin".into());
        map.insert("jantoven".into(), "warfarin".into());
        map.insert("eliquis".into(), "apixaban".into());
        map.insert("xarelto".into(), "rivaroxaban".into());
        map.insert("plavix".into(), "clopidogrel".into());

        // Antidepressants
        map.insert("prozac".into(), "fluoxetine".into());
        map.insert("zoloft".into(), "sertraline".into());
        map.insert("lexapro".into(), "escitalopram".into());
        map.insert("celexa".into(), "citalopram".into());
        map.insert("paxil".into(), "paroxetine".into());
        map.insert("wellbutrin".into(), "bupropion".into());

        // Cardiac / metabolic
        map.insert("lipitor".into(), "atorvastatin".into());
        map.insert("zocor".into(), "simvastatin".into());
        map.insert("crestor".into(), "rosuvastatin".into());
        map.insert("norvasc".into(), "amlodipine".into());
        map.insert("lanoxin".into(), "digoxin".into());
        map.insert("glucophage".into(), "metformin".into());
        map.insert("synthroid".into(), "levothyroxine".into());
        map.insert("levoxyl".into(), "levothyroxine".into());

        // GI
        map.insert("prilosec".into(), "omeprazole".into());
        map.insert("nexium".into(), "esomeprazole".into());
        map.insert("pepcid".into(), "famotidine".into());

        // Supplements sold under common names
        map.insert("fish oil".into(), "omega-3 fatty acids".into());
        map.insert("st johns wort".into(), "hypericum perforatum".into());
        map.insert("vitamin k1".into(), "phytonadione".into());
        map.insert("coq10".into(), "coenzyme q10".into());
        map.insert("ubiquinol".into(), "coenzyme q10".into());

        map
    }
}
