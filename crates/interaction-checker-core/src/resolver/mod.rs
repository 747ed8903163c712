//! Substance resolver: free text to a concrete substance.
//!
//! Pipeline: Cache → Remote Autocomplete → Fuzzy Fallback → Submit Resolution

mod fuzzy;
mod normalizer;
mod session;

pub use fuzzy::*;
pub use normalizer::*;
pub use session::*;

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{BackendError, InteractionBackend};
use crate::cache::{shared_search_cache, CacheKey, SharedSearchCache};
use crate::config::CheckerConfig;
use crate::models::{NotFoundItem, Substance, SubstanceType};

/// Results requested from the autocomplete endpoint.
pub const DEFAULT_AUTOCOMPLETE_LIMIT: usize = 12;

/// Threshold for "did you mean" suggestions on a failed submit.
pub const WEAK_SUGGESTION_SCORE: u8 = 25;

/// Number of "did you mean" suggestions on a failed submit.
pub const WEAK_SUGGESTION_LIMIT: usize = 3;

/// Resolver errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ResolverError {
    pub fn user_message(&self) -> String {
        match self {
            ResolverError::Backend(e) => e.user_message(),
        }
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Where a suggestion list came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    /// Blank query
    Empty,
    Cache,
    Remote,
    /// Local fuzzy fallback after an empty remote result
    Fuzzy,
}

/// Suggestions for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestions {
    pub query: String,
    pub kind: Option<SubstanceType>,
    pub items: Vec<Substance>,
    pub source: SuggestionSource,
}

impl Suggestions {
    fn new(query: &str, kind: Option<SubstanceType>, items: Vec<Substance>, source: SuggestionSource) -> Self {
        Self {
            query: query.to_string(),
            kind,
            items,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// How a submitted input was resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
    Highlighted,
    Fuzzy,
    ExactToken,
    /// Display name matched exactly in a comma-separated list
    DisplayName,
}

/// Outcome of submitting an input.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved { substance: Substance, via: ResolvedVia },
    NotFound(NotFoundItem),
}

impl Resolution {
    pub fn substance(&self) -> Option<&Substance> {
        match self {
            Resolution::Resolved { substance, .. } => Some(substance),
            Resolution::NotFound(_) => None,
        }
    }
}

/// Coordinates cache, remote autocomplete and the local catalog.
pub struct SubstanceResolver {
    backend: Arc<dyn InteractionBackend>,
    cache: SharedSearchCache,
    catalog: RwLock<Option<Arc<Vec<Substance>>>>,
    matcher: FuzzyMatcher,
    autocomplete_limit: usize,
}

impl SubstanceResolver {
    /// Create a resolver on the process-wide search cache.
    pub fn new(backend: Arc<dyn InteractionBackend>) -> Self {
        Self::with_cache(backend, shared_search_cache())
    }

    /// Create a resolver on a specific cache.
    pub fn with_cache(backend: Arc<dyn InteractionBackend>, cache: SharedSearchCache) -> Self {
        Self {
            backend,
            cache,
            catalog: RwLock::new(None),
            matcher: FuzzyMatcher::default(),
            autocomplete_limit: DEFAULT_AUTOCOMPLETE_LIMIT,
        }
    }

    /// Apply fuzzy and autocomplete settings from configuration.
    pub fn configured(mut self, config: &CheckerConfig) -> Self {
        self.matcher = FuzzyMatcher::new(config.fuzzy_min_score, config.fuzzy_limit);
        self.autocomplete_limit = config.autocomplete_limit;
        self
    }

    pub fn backend(&self) -> &Arc<dyn InteractionBackend> {
        &self.backend
    }

    /// Fresh cached results for a query, if any.
    pub fn cached(&self, query: &str, kind: Option<SubstanceType>) -> Option<Vec<Substance>> {
        let key = CacheKey::new(kind, query);
        let hit = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key);
        if hit.is_some() {
            debug!(query = %key.query, "search cache hit");
        }
        hit
    }

    /// Suggestions served from the cache alone, with fuzzy fallback for a
    /// cached empty result. `None` on a miss.
    pub fn suggest_cached(&self, query: &str, kind: Option<SubstanceType>) -> Option<Suggestions> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Some(Suggestions::new(trimmed, kind, Vec::new(), SuggestionSource::Empty));
        }
        self.cached(trimmed, kind)
            .map(|items| self.with_fallback(trimmed, kind, items, SuggestionSource::Cache))
    }

    /// Suggestions for a query.
    ///
    /// A blank query yields nothing without touching the network. Cache
    /// hits skip the network. Remote results (empty ones included) are
    /// cached; an empty result falls back to fuzzy matching against the
    /// loaded catalog.
    pub async fn suggest(&self, query: &str, kind: Option<SubstanceType>) -> ResolverResult<Suggestions> {
        if let Some(suggestions) = self.suggest_cached(query, kind) {
            return Ok(suggestions);
        }

        let trimmed = query.trim();
        let items = self
            .backend
            .autocomplete(trimmed, kind, self.autocomplete_limit)
            .await?;

        if let Some(evicted) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(CacheKey::new(kind, trimmed), items.clone())
        {
            debug!(evicted = %evicted.query, "search cache eviction");
        }

        Ok(self.with_fallback(trimmed, kind, items, SuggestionSource::Remote))
    }

    fn with_fallback(
        &self,
        query: &str,
        kind: Option<SubstanceType>,
        items: Vec<Substance>,
        source: SuggestionSource,
    ) -> Suggestions {
        if !items.is_empty() {
            return Suggestions::new(query, kind, items, source);
        }
        let fuzzy: Vec<Substance> = self
            .fuzzy(query, kind)
            .into_iter()
            .map(|s| s.substance)
            .collect();
        if fuzzy.is_empty() {
            Suggestions::new(query, kind, fuzzy, source)
        } else {
            Suggestions::new(query, kind, fuzzy, SuggestionSource::Fuzzy)
        }
    }

    /// Fetch the full substance list for fuzzy fallback and exact token
    /// resolution. Returns the number of substances loaded.
    pub async fn load_catalog(&self) -> ResolverResult<usize> {
        let substances = self.backend.list_substances(None).await?;
        let count = substances.len();
        self.set_catalog(substances);
        debug!(count, "substance catalog loaded");
        Ok(count)
    }

    /// Replace the local catalog.
    pub fn set_catalog(&self, substances: Vec<Substance>) {
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(substances));
    }

    /// Drop cached suggestions and the loaded catalog after the underlying
    /// data changed.
    pub fn invalidate(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn catalog(&self) -> Option<Arc<Vec<Substance>>> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Fuzzy candidates from the loaded catalog; empty when none is loaded.
    pub fn fuzzy(&self, query: &str, kind: Option<SubstanceType>) -> Vec<ScoredSubstance> {
        match self.catalog() {
            Some(catalog) => self.matcher.matches(query, &catalog, kind),
            None => Vec::new(),
        }
    }

    /// Resolve a submitted input against local state.
    ///
    /// Priority: the highlighted suggestion, then the top fuzzy candidate,
    /// then an exact token match. Returns `None` for blank input.
    pub fn resolve_submit(
        &self,
        input: &str,
        kind: Option<SubstanceType>,
        highlighted: Option<&Substance>,
    ) -> Option<Resolution> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(substance) = highlighted {
            return Some(Resolution::Resolved {
                substance: substance.clone(),
                via: ResolvedVia::Highlighted,
            });
        }

        if let Some(top) = self.fuzzy(trimmed, kind).into_iter().next() {
            return Some(Resolution::Resolved {
                substance: top.substance,
                via: ResolvedVia::Fuzzy,
            });
        }

        let catalog = self.catalog();
        let candidates: &[Substance] = catalog.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        let of_kind: Vec<Substance> = candidates
            .iter()
            .filter(|s| s.matches_kind(kind))
            .cloned()
            .collect();
        if let Some(substance) = find_by_token(trimmed, &of_kind) {
            return Some(Resolution::Resolved {
                substance: substance.clone(),
                via: ResolvedVia::ExactToken,
            });
        }

        Some(not_found(trimmed, kind, candidates))
    }

    /// Resolve a comma-separated list such as "Warfarin, Vitamin K".
    ///
    /// Each item must match a display name of the requested kind exactly
    /// (case-insensitive). Items resolving to an already listed substance
    /// are dropped. Returns `None` unless the input holds at least two
    /// items; single names go through [`resolve_submit`](Self::resolve_submit).
    pub fn resolve_many(&self, input: &str, kind: Option<SubstanceType>) -> Option<Vec<Resolution>> {
        let items: Vec<&str> = input
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        if items.len() < 2 {
            return None;
        }

        let catalog = self.catalog();
        let candidates: &[Substance] = catalog.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(items.len());

        for item in items {
            let wanted = item.to_lowercase();
            let matched = candidates
                .iter()
                .find(|s| s.matches_kind(kind) && s.display_name.to_lowercase() == wanted);
            match matched {
                Some(substance) => {
                    if seen.insert(substance.substance_id.clone()) {
                        out.push(Resolution::Resolved {
                            substance: substance.clone(),
                            via: ResolvedVia::DisplayName,
                        });
                    }
                }
                None => out.push(not_found(item, kind, candidates)),
            }
        }
        Some(out)
    }

    /// Like [`resolve_submit`](Self::resolve_submit), loading the catalog
    /// first if it has not been loaded. A failed load is logged and the
    /// resolution proceeds without it.
    pub async fn submit(
        &self,
        input: &str,
        kind: Option<SubstanceType>,
        highlighted: Option<&Substance>,
    ) -> Option<Resolution> {
        if highlighted.is_none() && self.catalog().is_none() {
            if let Err(e) = self.load_catalog().await {
                warn!(error = %e, "catalog load failed; resolving without it");
            }
        }
        self.resolve_submit(input, kind, highlighted)
    }

    /// Like [`resolve_many`](Self::resolve_many), loading the catalog first
    /// if it has not been loaded.
    pub async fn submit_many(&self, input: &str, kind: Option<SubstanceType>) -> Option<Vec<Resolution>> {
        if self.catalog().is_none() {
            if let Err(e) = self.load_catalog().await {
                warn!(error = %e, "catalog load failed; resolving without it");
            }
        }
        self.resolve_many(input, kind)
    }
}

fn not_found(input: &str, kind: Option<SubstanceType>, candidates: &[Substance]) -> Resolution {
    let weak = FuzzyMatcher::new(WEAK_SUGGESTION_SCORE, WEAK_SUGGESTION_LIMIT)
        .matches(input, candidates, kind)
        .into_iter()
        .map(|s| s.substance)
        .collect();
    Resolution::NotFound(NotFoundItem::new(input, kind, weak))
}
