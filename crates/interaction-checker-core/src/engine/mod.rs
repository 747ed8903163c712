//! Stack pairwise-interaction engine.
//!
//! Pipeline: Validate → Pairs → Concurrent Lookups → Merge → Sort → Summarize

mod pairs;
mod ranking;

pub use pairs::*;
pub use ranking::*;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, InteractionBackend, LookupLog};
use crate::config::CheckerConfig;
use crate::models::{
    CheckOutcome, CheckPhase, CheckSummary, CheckerMode, FailedPair, Interaction, NotFoundItem,
    SelectionSet, StackPair, Substance,
};
use crate::resolver::normalize_token;

/// Validation errors. Nothing is looked up when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("Add at least {required} substances to check interactions (have {got})")]
    InsufficientSubstances { required: usize, got: usize },

    #[error("Add at least one {0} to check interactions")]
    MissingSide(&'static str),

    #[error("{0} is listed more than once")]
    DuplicateSubstance(String),
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Pause before a retry, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOptions {
    pub concurrency: usize,
    pub pair_timeout: Duration,
    pub retries: u32,
    pub log_lookups: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::from(&CheckerConfig::default())
    }
}

impl From<&CheckerConfig> for CheckOptions {
    fn from(config: &CheckerConfig) -> Self {
        Self {
            concurrency: config.check_concurrency.max(1),
            pair_timeout: config.pair_timeout(),
            retries: config.pair_retries,
            log_lookups: config.log_lookups,
        }
    }
}

/// Runs pairwise checks against a backend.
pub struct StackChecker {
    backend: Arc<dyn InteractionBackend>,
    options: CheckOptions,
    phase: watch::Sender<CheckPhase>,
}

impl StackChecker {
    pub fn new(backend: Arc<dyn InteractionBackend>) -> Self {
        Self::with_options(backend, CheckOptions::default())
    }

    pub fn with_options(backend: Arc<dyn InteractionBackend>, options: CheckOptions) -> Self {
        let (phase, _) = watch::channel(CheckPhase::Idle);
        Self {
            backend,
            options,
            phase,
        }
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<CheckPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> CheckPhase {
        *self.phase.borrow()
    }

    /// Check every pair in a free-form stack.
    pub async fn check(&self, stack: &[Substance]) -> CheckResult<CheckOutcome> {
        self.check_mode(&CheckerMode::Stack(stack.to_vec())).await
    }

    /// Check the current selection.
    pub async fn check_selection(&self, selection: &SelectionSet) -> CheckResult<CheckOutcome> {
        self.check(selection.items()).await
    }

    /// Check a mode's pairs.
    pub async fn check_mode(&self, mode: &CheckerMode) -> CheckResult<CheckOutcome> {
        self.check_with_unresolved(mode, &[]).await
    }

    /// Check a mode's pairs, recording inputs that never resolved in the
    /// lookup log.
    pub async fn check_with_unresolved(
        &self,
        mode: &CheckerMode,
        unresolved: &[NotFoundItem],
    ) -> CheckResult<CheckOutcome> {
        self.phase.send_replace(CheckPhase::Validating);
        let pairs = match validate(mode) {
            Ok(pairs) => pairs,
            Err(e) => {
                self.phase.send_replace(CheckPhase::Error);
                return Err(e);
            }
        };

        let pair_count = pairs.len();
        info!(mode = mode.name(), pairs = pair_count, "checking interactions");
        self.phase.send_replace(CheckPhase::Running { remaining: pair_count });

        let remaining = AtomicUsize::new(pair_count);
        let results: Vec<Result<Vec<Interaction>, FailedPair>> = stream::iter(pairs.iter())
            .map(|pair| {
                let remaining = &remaining;
                async move {
                    let result = self.lookup_pair(pair).await;
                    let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                    self.phase.send_replace(CheckPhase::Running { remaining: left });
                    result
                }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        self.phase.send_replace(CheckPhase::Merging);
        let mut failed_pairs = Vec::new();
        let mut found = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(list) => found.push(list),
                Err(failed) => failed_pairs.push(failed),
            }
        }
        let mut interactions = merge_unique(found);

        sort_by_severity(&mut interactions);
        self.phase.send_replace(CheckPhase::Sorted);

        let summary = CheckSummary::from_interactions(&interactions);
        let outcome = CheckOutcome {
            pair_count,
            top_concern: interactions.first().cloned(),
            interactions,
            summary,
            failed_pairs,
        };

        if outcome.is_partial() {
            warn!(
                failed = outcome.failed_pairs.len(),
                pairs = pair_count,
                "check completed with skipped pairs"
            );
        }
        info!(total = outcome.summary.total, major = outcome.summary.major, "check complete");

        if self.options.log_lookups {
            self.spawn_lookup_log(mode, unresolved, &outcome);
        }
        self.phase.send_replace(CheckPhase::Done);
        Ok(outcome)
    }

    /// Look up one pair with timeout and retries. A pair that still fails
    /// is reported, never fatal.
    async fn lookup_pair(&self, pair: &StackPair) -> Result<Vec<Interaction>, FailedPair> {
        let attempts = self.options.retries + 1;
        let mut last_error = BackendError::Network("not attempted".into());

        for attempt in 1..=attempts {
            let call = self.backend.interactions_by_tokens(&pair.token_a, &pair.token_b);
            match tokio::time::timeout(self.options.pair_timeout, call).await {
                Ok(Ok(found)) => {
                    debug!(pair = %pair.label(), count = found.len(), "pair checked");
                    return Ok(found);
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = BackendError::Timeout(self.options.pair_timeout.as_millis() as u64),
            }

            if !last_error.is_transient() || attempt == attempts {
                break;
            }
            debug!(pair = %pair.label(), attempt, error = %last_error, "retrying pair");
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }

        warn!(pair = %pair.label(), error = %last_error, "skipping pair");
        Err(FailedPair {
            token_a: pair.token_a.clone(),
            token_b: pair.token_b.clone(),
            reason: last_error.to_string(),
        })
    }

    fn spawn_lookup_log(&self, mode: &CheckerMode, unresolved: &[NotFoundItem], outcome: &CheckOutcome) {
        let substances = mode.substances();
        let inputs: Vec<String> = substances
            .iter()
            .map(|s| s.display_name.clone())
            .chain(unresolved.iter().map(|n| n.raw_name.clone()))
            .collect();
        let log = LookupLog {
            normalized_inputs: inputs
                .iter()
                .map(|input| normalize_token(input).into_string())
                .collect(),
            inputs,
            resolved_substance_ids: substances.iter().map(|s| s.substance_id.clone()).collect(),
            unresolved_inputs: unresolved.iter().map(|n| n.raw_name.clone()).collect(),
            results_summary: outcome.summary.clone(),
            has_results: outcome.has_results(),
            mode: mode.name().to_string(),
            logged_at: chrono::Utc::now().to_rfc3339(),
        };

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.log_lookup(&log).await {
                debug!(error = %e, "lookup log not recorded");
            }
        });
    }
}

/// Validate a mode and build its pairs.
fn validate(mode: &CheckerMode) -> CheckResult<Vec<StackPair>> {
    let mut seen = HashSet::new();
    if let Some(dup) = mode.substances().into_iter().find(|s| !seen.insert(s.substance_id.as_str())) {
        return Err(CheckError::DuplicateSubstance(dup.display_name.clone()));
    }

    match mode {
        CheckerMode::Stack(list) | CheckerMode::SupplementsSupplements(list) => {
            if list.len() < 2 {
                return Err(CheckError::InsufficientSubstances {
                    required: 2,
                    got: list.len(),
                });
            }
            Ok(generate_pairs(list))
        }
        CheckerMode::SupplementsDrugs {
            supplements,
            medications,
        } => {
            if supplements.is_empty() {
                return Err(CheckError::MissingSide("supplement"));
            }
            if medications.is_empty() {
                return Err(CheckError::MissingSide("medication"));
            }
            Ok(generate_cross_pairs(supplements, medications))
        }
    }
}
