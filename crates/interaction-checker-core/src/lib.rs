//! Interaction Checker Core Library
//!
//! Supplement and medication interaction checking: resolve what the user
//! typed to catalog substances, then look up every pair in their stack.
//!
//! # Architecture
//!
//! ```text
//!   keystrokes ──► SearchSession (debounce, last request wins)
//!                        │
//!                        ▼
//!                 SubstanceResolver ──► SearchCache (TTL + LRU)
//!                        │                   │ miss
//!                        │                   ▼
//!                        │            InteractionBackend::autocomplete
//!                        │                   │ empty
//!                        │                   ▼
//!                        │             fuzzy catalog match
//!                        ▼
//!            Resolved substance / NotFound item
//!                        │
//!                        ▼
//!   SelectionSet ──► StackChecker ──► pairs ──► interactions_by_tokens (bounded)
//!                                                   │
//!                                      merge ─► dedupe ─► sort ─► summary
//! ```
//!
//! The backend is either the hosted catalog API ([`backend::HttpBackend`])
//! or a local SQLite catalog ([`backend::LocalBackend`]).
//!
//! # Modules
//!
//! - [`backend`]: Catalog and interaction lookups, remote or local
//! - [`cache`]: Autocomplete result cache
//! - [`config`]: Endpoint and tuning configuration
//! - [`db`]: SQLite catalog store and bulk import
//! - [`engine`]: Pairwise interaction engine
//! - [`models`]: Domain types (Substance, Interaction, Severity, etc.)
//! - [`resolver`]: Token normalization, fuzzy matching, search sessions

pub mod backend;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use backend::{HttpBackend, InteractionBackend, LocalBackend};
pub use config::CheckerConfig;
pub use db::Database;
pub use engine::{CheckOptions, StackChecker};
pub use models::{
    CheckOutcome, CheckSummary, CheckerMode, Interaction, NotFoundItem, SelectionSet, Severity,
    Substance, SubstanceType,
};
pub use resolver::{LookupToken, Normalizer, SearchSession, SubstanceResolver};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tokio::runtime::Runtime;

use crate::cache::isolated_search_cache;
use crate::resolver::Resolution;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum InteractionCheckerError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("{0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for InteractionCheckerError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => InteractionCheckerError::NotFound(what),
            other => InteractionCheckerError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for InteractionCheckerError {
    fn from(e: serde_json::Error) -> Self {
        InteractionCheckerError::SerializationError(e.to_string())
    }
}

impl From<backend::BackendError> for InteractionCheckerError {
    fn from(e: backend::BackendError) -> Self {
        match e {
            backend::BackendError::Storage(msg) => InteractionCheckerError::DatabaseError(msg),
            other => InteractionCheckerError::NetworkError(other.user_message()),
        }
    }
}

impl From<resolver::ResolverError> for InteractionCheckerError {
    fn from(e: resolver::ResolverError) -> Self {
        match e {
            resolver::ResolverError::Backend(inner) => inner.into(),
        }
    }
}

impl From<engine::CheckError> for InteractionCheckerError {
    fn from(e: engine::CheckError) -> Self {
        InteractionCheckerError::InvalidInput(e.to_string())
    }
}

impl From<config::ConfigError> for InteractionCheckerError {
    fn from(e: config::ConfigError) -> Self {
        InteractionCheckerError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for InteractionCheckerError {
    fn from(e: std::io::Error) -> Self {
        InteractionCheckerError::ConfigError(format!("Runtime init failed: {e}"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for InteractionCheckerError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        InteractionCheckerError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a local catalog database at the given path.
#[uniffi::export]
pub fn open_checker(path: String) -> Result<Arc<InteractionChecker>, InteractionCheckerError> {
    let db = Database::open(&path)?;
    InteractionChecker::local(db, &CheckerConfig::default())
}

/// Create an in-memory catalog (for testing).
#[uniffi::export]
pub fn open_checker_in_memory() -> Result<Arc<InteractionChecker>, InteractionCheckerError> {
    let db = Database::open_in_memory()?;
    InteractionChecker::local(db, &CheckerConfig::default())
}

/// Connect to the hosted catalog API using `SUPABASE_*` / `CHECKER_*`
/// environment variables.
#[uniffi::export]
pub fn open_remote_checker() -> Result<Arc<InteractionChecker>, InteractionCheckerError> {
    let config = CheckerConfig::from_env()?;
    InteractionChecker::remote(&config)
}

/// Stack size cap for a subscription plan name.
#[uniffi::export]
pub fn stack_limit_for_plan(plan: Option<String>) -> u32 {
    models::Tier::from_plan(plan.as_deref()).max_stack_size() as u32
}

/// Context notes for an interaction given the user's flagged circumstances.
#[uniffi::export]
pub fn context_notes(interaction: FfiInteraction, flags: FfiContextFlags) -> Vec<FfiContextNote> {
    let text = [
        Some(interaction.summary.as_str()),
        interaction.mechanism.as_deref(),
        interaction.clinical_effect.as_deref(),
        interaction.management.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    models::context_notes(&text, &flags.into(), Severity::parse(&interaction.severity))
        .into_iter()
        .map(|note| note.into())
        .collect()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe checker for FFI. Async work runs on an owned runtime.
#[derive(uniffi::Object)]
pub struct InteractionChecker {
    runtime: Runtime,
    db: Option<Arc<Mutex<Database>>>,
    resolver: Arc<SubstanceResolver>,
    checker: StackChecker,
}

impl InteractionChecker {
    /// Checker over a local catalog database.
    pub fn local(db: Database, config: &CheckerConfig) -> Result<Arc<Self>, InteractionCheckerError> {
        let backend = LocalBackend::new(db);
        let db = backend.database();
        Self::build(Arc::new(backend), Some(db), config)
    }

    /// Checker over the hosted catalog API.
    pub fn remote(config: &CheckerConfig) -> Result<Arc<Self>, InteractionCheckerError> {
        let backend = HttpBackend::from_config(config)?;
        Self::build(Arc::new(backend), None, config)
    }

    fn build(
        backend: Arc<dyn InteractionBackend>,
        db: Option<Arc<Mutex<Database>>>,
        config: &CheckerConfig,
    ) -> Result<Arc<Self>, InteractionCheckerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let cache = isolated_search_cache(config.cache_capacity, config.cache_ttl());
        let resolver = SubstanceResolver::with_cache(Arc::clone(&backend), cache).configured(config);
        let checker = StackChecker::with_options(backend, CheckOptions::from(config));

        Ok(Arc::new(Self {
            runtime,
            db,
            resolver: Arc::new(resolver),
            checker,
        }))
    }

    /// The resolver, for callers that drive a [`SearchSession`] themselves.
    pub fn resolver(&self) -> Arc<SubstanceResolver> {
        Arc::clone(&self.resolver)
    }

    fn local_db(&self) -> Result<&Arc<Mutex<Database>>, InteractionCheckerError> {
        self.db.as_ref().ok_or_else(|| {
            InteractionCheckerError::InvalidInput("operation needs a local catalog database".into())
        })
    }
}

#[uniffi::export]
impl InteractionChecker {
    // =========================================================================
    // Resolver Operations
    // =========================================================================

    /// Autocomplete suggestions for a query, optionally restricted to
    /// `drug` or `supplement`.
    pub fn search(
        &self,
        query: String,
        kind: Option<String>,
    ) -> Result<Vec<FfiSubstance>, InteractionCheckerError> {
        let kind = parse_kind(kind.as_deref())?;
        let suggestions = self.runtime.block_on(self.resolver.suggest(&query, kind))?;
        Ok(suggestions.items.into_iter().map(|s| s.into()).collect())
    }

    /// Resolve a submitted input. `None` for blank input.
    pub fn resolve_submit(
        &self,
        input: String,
        kind: Option<String>,
        highlighted: Option<FfiSubstance>,
    ) -> Result<Option<FfiResolution>, InteractionCheckerError> {
        let kind = parse_kind(kind.as_deref())?;
        let highlighted = highlighted.map(Substance::try_from).transpose()?;
        let resolution = self
            .runtime
            .block_on(self.resolver.submit(&input, kind, highlighted.as_ref()));
        Ok(resolution.map(|r| r.into()))
    }

    /// Resolve a comma-separated list, one resolution per item. `None`
    /// when the input holds fewer than two items.
    pub fn resolve_many(
        &self,
        input: String,
        kind: Option<String>,
    ) -> Result<Option<Vec<FfiResolution>>, InteractionCheckerError> {
        let kind = parse_kind(kind.as_deref())?;
        let resolutions = self.runtime.block_on(self.resolver.submit_many(&input, kind));
        Ok(resolutions.map(|items| items.into_iter().map(|r| r.into()).collect()))
    }

    // =========================================================================
    // Check Operations
    // =========================================================================

    /// Check every pair within a stack.
    pub fn check_stack(
        &self,
        substances: Vec<FfiSubstance>,
    ) -> Result<FfiCheckOutcome, InteractionCheckerError> {
        let stack = to_substances(substances)?;
        let outcome = self.runtime.block_on(self.checker.check(&stack))?;
        Ok(outcome.into())
    }

    /// Check every supplement against every medication.
    pub fn check_supplements_drugs(
        &self,
        supplements: Vec<FfiSubstance>,
        medications: Vec<FfiSubstance>,
    ) -> Result<FfiCheckOutcome, InteractionCheckerError> {
        let mode = CheckerMode::SupplementsDrugs {
            supplements: to_substances(supplements)?,
            medications: to_substances(medications)?,
        };
        let outcome = self.runtime.block_on(self.checker.check_mode(&mode))?;
        Ok(outcome.into())
    }

    /// Check every pair within a supplement list.
    pub fn check_supplements(
        &self,
        supplements: Vec<FfiSubstance>,
    ) -> Result<FfiCheckOutcome, InteractionCheckerError> {
        let mode = CheckerMode::SupplementsSupplements(to_substances(supplements)?);
        let outcome = self.runtime.block_on(self.checker.check_mode(&mode))?;
        Ok(outcome.into())
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Ask for a substance to be added to the catalog. Returns the request id.
    pub fn request_addition(
        &self,
        raw_name: String,
        kind: Option<String>,
    ) -> Result<String, InteractionCheckerError> {
        let kind = parse_kind(kind.as_deref())?;
        let request = backend::AdditionRequest::new(&raw_name, kind);
        if request.raw_name.is_empty() {
            return Err(InteractionCheckerError::InvalidInput("substance name is empty".into()));
        }
        let id = self
            .runtime
            .block_on(self.resolver.backend().request_addition(&request))?;
        Ok(id)
    }

    /// Catalog counts.
    pub fn stats(&self) -> Result<FfiCatalogStats, InteractionCheckerError> {
        let stats = self.runtime.block_on(self.resolver.backend().stats())?;
        Ok(stats.into())
    }

    /// Import a catalog JSON document into the local database.
    pub fn import_catalog_json(&self, json: String) -> Result<FfiImportSummary, InteractionCheckerError> {
        let summary = {
            let mut db = self.local_db()?.lock()?;
            db.import_catalog_json(&json)?
        };
        self.resolver.invalidate();
        Ok(summary.into())
    }

    /// Map built-in brand names onto catalog substances. Returns the number
    /// of aliases written.
    pub fn seed_brand_aliases(&self) -> Result<u32, InteractionCheckerError> {
        let written = {
            let db = self.local_db()?.lock()?;
            db.seed_alias_packs(&Normalizer::new())?
        };
        self.resolver.invalidate();
        Ok(written as u32)
    }
}

fn parse_kind(kind: Option<&str>) -> Result<Option<SubstanceType>, InteractionCheckerError> {
    kind.filter(|k| !k.trim().is_empty())
        .map(|k| k.parse().map_err(InteractionCheckerError::InvalidInput))
        .transpose()
}

fn to_substances(items: Vec<FfiSubstance>) -> Result<Vec<Substance>, InteractionCheckerError> {
    items.into_iter().map(Substance::try_from).collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe substance.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubstance {
    pub substance_id: String,
    pub display_name: String,
    pub canonical_name: String,
    /// `drug` or `supplement`
    pub kind: String,
    pub aliases: Vec<String>,
}

impl From<Substance> for FfiSubstance {
    fn from(s: Substance) -> Self {
        Self {
            substance_id: s.substance_id,
            display_name: s.display_name,
            canonical_name: s.canonical_name,
            kind: s.kind.to_string(),
            aliases: s.aliases,
        }
    }
}

impl TryFrom<FfiSubstance> for Substance {
    type Error = InteractionCheckerError;

    fn try_from(s: FfiSubstance) -> Result<Self, Self::Error> {
        let kind = s.kind.parse().map_err(InteractionCheckerError::InvalidInput)?;
        let mut substance = Substance::new(s.substance_id, s.display_name, s.canonical_name, kind);
        substance.aliases = s.aliases;
        Ok(substance)
    }
}

/// FFI-safe unresolved input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotFound {
    pub id: String,
    pub raw_name: String,
    pub kind: Option<String>,
    pub suggestions: Vec<FfiSubstance>,
}

impl From<NotFoundItem> for FfiNotFound {
    fn from(item: NotFoundItem) -> Self {
        Self {
            id: item.id,
            raw_name: item.raw_name,
            kind: item.kind.map(|k| k.to_string()),
            suggestions: item.suggestions.into_iter().map(|s| s.into()).collect(),
        }
    }
}

/// FFI-safe submit resolution. Exactly one of `resolved` and `not_found`
/// is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResolution {
    pub resolved: Option<FfiSubstance>,
    /// `highlighted`, `fuzzy`, `exact_token` or `display_name`
    pub via: Option<String>,
    pub not_found: Option<FfiNotFound>,
}

impl From<Resolution> for FfiResolution {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::Resolved { substance, via } => Self {
                resolved: Some(substance.into()),
                via: serde_json::to_value(via)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string)),
                not_found: None,
            },
            Resolution::NotFound(item) => Self {
                resolved: None,
                via: None,
                not_found: Some(item.into()),
            },
        }
    }
}

/// FFI-safe interaction with display labels resolved.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInteraction {
    pub interaction_id: String,
    pub substance_a_id: String,
    pub substance_a_name: String,
    pub substance_b_id: String,
    pub substance_b_name: String,
    pub severity: String,
    pub severity_label: String,
    pub consumer_label: String,
    pub risk_level: String,
    pub safety_grade: String,
    pub confidence_label: String,
    pub summary: String,
    pub mechanism: Option<String>,
    pub clinical_effect: Option<String>,
    pub management: Option<String>,
    pub evidence_grade: Option<String>,
    pub citations: Vec<String>,
}

impl From<Interaction> for FfiInteraction {
    fn from(i: Interaction) -> Self {
        let safety = i.safety_label();
        Self {
            substance_a_name: i.substance_a.label().to_string(),
            substance_b_name: i.substance_b.label().to_string(),
            interaction_id: i.interaction_id,
            substance_a_id: i.substance_a.id,
            substance_b_id: i.substance_b.id,
            severity: i.severity.to_string(),
            severity_label: i.severity.clinical_label().to_string(),
            consumer_label: i.severity.consumer().label().to_string(),
            risk_level: i.severity.risk_level().label().to_string(),
            safety_grade: safety.grade_label,
            confidence_label: safety.confidence_label,
            summary: i.summary,
            mechanism: i.mechanism,
            clinical_effect: i.clinical_effect,
            management: i.management,
            evidence_grade: i.evidence_grade,
            citations: i.citations,
        }
    }
}

/// FFI-safe context flags.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiContextFlags {
    pub blood_thinners: bool,
    pub pregnancy: bool,
    pub surgery: bool,
    pub blood_pressure: bool,
}

impl From<FfiContextFlags> for models::ContextFlags {
    fn from(f: FfiContextFlags) -> Self {
        Self {
            blood_thinners: f.blood_thinners,
            pregnancy: f.pregnancy,
            surgery: f.surgery,
            blood_pressure: f.blood_pressure,
        }
    }
}

/// FFI-safe context note.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiContextNote {
    /// `blood_thinners`, `pregnancy`, `surgery` or `blood_pressure`
    pub kind: String,
    pub message: String,
}

impl From<models::ContextNote> for FfiContextNote {
    fn from(note: models::ContextNote) -> Self {
        Self {
            kind: serde_json::to_value(note.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            message: note.message,
        }
    }
}

/// FFI-safe severity counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckSummary {
    pub total: u32,
    pub major: u32,
    pub moderate: u32,
    pub minor: u32,
    pub monitor: u32,
    pub info: u32,
    pub unknown: u32,
}

impl From<CheckSummary> for FfiCheckSummary {
    fn from(s: CheckSummary) -> Self {
        Self {
            total: s.total as u32,
            major: s.major as u32,
            moderate: s.moderate as u32,
            minor: s.minor as u32,
            monitor: s.monitor as u32,
            info: s.info as u32,
            unknown: s.unknown as u32,
        }
    }
}

/// FFI-safe check outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckOutcome {
    pub pair_count: u32,
    pub interactions: Vec<FfiInteraction>,
    pub summary: FfiCheckSummary,
    pub top_concern: Option<FfiInteraction>,
    /// "token_a + token_b: reason" for each pair whose lookup failed
    pub failed_pairs: Vec<String>,
}

impl From<CheckOutcome> for FfiCheckOutcome {
    fn from(o: CheckOutcome) -> Self {
        Self {
            pair_count: o.pair_count as u32,
            interactions: o.interactions.into_iter().map(|i| i.into()).collect(),
            summary: o.summary.into(),
            top_concern: o.top_concern.map(|i| i.into()),
            failed_pairs: o
                .failed_pairs
                .into_iter()
                .map(|f| format!("{} + {}: {}", f.token_a.as_str(), f.token_b.as_str(), f.reason))
                .collect(),
        }
    }
}

/// FFI-safe catalog counts. Missing counts are unknown, not zero.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogStats {
    pub supplements: Option<u64>,
    pub drugs: Option<u64>,
    pub interactions: u64,
    pub tokens: u64,
}

impl From<backend::CatalogStats> for FfiCatalogStats {
    fn from(s: backend::CatalogStats) -> Self {
        Self {
            supplements: s.supplements,
            drugs: s.drugs,
            interactions: s.interactions,
            tokens: s.tokens,
        }
    }
}

/// FFI-safe import summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportSummary {
    pub substances: u32,
    pub interactions: u32,
    pub brand_aliases: u32,
}

impl From<db::ImportSummary> for FfiImportSummary {
    fn from(s: db::ImportSummary) -> Self {
        Self {
            substances: s.substances as u32,
            interactions: s.interactions as u32,
            brand_aliases: s.brand_aliases as u32,
        }
    }
}
