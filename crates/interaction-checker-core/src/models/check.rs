//! Check requests and outcomes for the pairwise engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Interaction, Severity, Substance};
use crate::resolver::LookupToken;

/// One unordered pair to look up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackPair {
    pub token_a: LookupToken,
    pub token_b: LookupToken,
    pub substance_a: Substance,
    pub substance_b: Substance,
}

impl StackPair {
    /// Label for logs, e.g. "Vitamin K + Warfarin".
    pub fn label(&self) -> String {
        format!("{} + {}", self.substance_a.display_name, self.substance_b.display_name)
    }
}

/// Which checker view produced the request.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckerMode {
    /// Every pair within one free-form stack
    Stack(Vec<Substance>),
    /// Every supplement against every medication
    SupplementsDrugs {
        supplements: Vec<Substance>,
        medications: Vec<Substance>,
    },
    /// Every pair within a supplement list
    SupplementsSupplements(Vec<Substance>),
}

impl CheckerMode {
    pub fn name(&self) -> &'static str {
        match self {
            CheckerMode::Stack(_) => "stack",
            CheckerMode::SupplementsDrugs { .. } => "supplements-drugs",
            CheckerMode::SupplementsSupplements(_) => "supplements-supplements",
        }
    }

    /// All substances in input order.
    pub fn substances(&self) -> Vec<&Substance> {
        match self {
            CheckerMode::Stack(list) | CheckerMode::SupplementsSupplements(list) => list.iter().collect(),
            CheckerMode::SupplementsDrugs { supplements, medications } => {
                supplements.iter().chain(medications.iter()).collect()
            }
        }
    }
}

/// Counts per severity bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSummary {
    pub total: usize,
    pub major: usize,
    pub moderate: usize,
    pub minor: usize,
    pub monitor: usize,
    pub info: usize,
    pub unknown: usize,
}

impl CheckSummary {
    /// Tally a result list.
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut summary = CheckSummary {
            total: interactions.len(),
            ..Default::default()
        };
        for i in interactions {
            match i.severity {
                Severity::Major => summary.major += 1,
                Severity::Moderate => summary.moderate += 1,
                Severity::Minor => summary.minor += 1,
                Severity::Monitor => summary.monitor += 1,
                Severity::Info => summary.info += 1,
                Severity::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Major => self.major,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
            Severity::Monitor => self.monitor,
            Severity::Info => self.info,
            Severity::Unknown => self.unknown,
        }
    }
}

/// A pair whose lookup failed after retries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedPair {
    pub token_a: LookupToken,
    pub token_b: LookupToken,
    pub reason: String,
}

/// Result of one check invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckOutcome {
    pub pair_count: usize,
    /// Deduplicated, sorted most severe first
    pub interactions: Vec<Interaction>,
    pub summary: CheckSummary,
    pub top_concern: Option<Interaction>,
    /// Pairs skipped because their lookup failed
    pub failed_pairs: Vec<FailedPair>,
}

impl CheckOutcome {
    pub fn has_results(&self) -> bool {
        !self.interactions.is_empty()
    }

    /// True when some pairs could not be checked.
    pub fn is_partial(&self) -> bool {
        !self.failed_pairs.is_empty()
    }
}

/// Progress of a check invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CheckPhase {
    #[default]
    Idle,
    Validating,
    Running { remaining: usize },
    Merging,
    Sorted,
    Done,
    /// Validation failed; nothing was looked up
    Error,
}

/// Result filters offered to paid tiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    /// Keep only these severities; empty keeps all
    pub severities: HashSet<Severity>,
    /// Minimum numeric confidence (0–100); 0 disables
    pub min_confidence: f64,
}

impl ResultFilter {
    pub fn is_active(&self) -> bool {
        !self.severities.is_empty() || self.min_confidence > 0.0
    }

    /// Apply the filter, preserving order.
    pub fn apply<'a>(&self, interactions: &'a [Interaction]) -> Vec<&'a Interaction> {
        interactions
            .iter()
            .filter(|i| self.severities.is_empty() || self.severities.contains(&i.severity))
            .filter(|i| {
                self.min_confidence <= 0.0
                    || i.confidence_percent().is_some_and(|p| p >= self.min_confidence)
            })
            .collect()
    }
}
