//! Interaction records returned by pairwise lookups.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Confidence, SafetyLabel, Severity, SubstanceRef};

/// A documented relationship between two substances.
///
/// Symmetric in identity: the record for (A, B) is the record for (B, A),
/// so merging keys on `interaction_id` only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "InteractionRecord", into = "InteractionRecord")]
pub struct Interaction {
    pub interaction_id: String,
    pub substance_a: SubstanceRef,
    pub substance_b: SubstanceRef,
    pub interaction_type: Option<String>,
    /// Canonical severity
    pub severity: Severity,
    /// Severity exactly as the record carried it
    pub severity_raw: Option<String>,
    pub confidence: Confidence,
    /// Confidence exactly as the record carried it (label or number)
    pub confidence_raw: Option<String>,
    pub summary: String,
    pub mechanism: Option<String>,
    pub clinical_effect: Option<String>,
    pub management: Option<String>,
    pub evidence_grade: Option<String>,
    pub citations: Vec<String>,
}

impl Interaction {
    /// Create a record with the given identity and severity and empty narrative.
    pub fn new(
        interaction_id: impl Into<String>,
        substance_a: SubstanceRef,
        substance_b: SubstanceRef,
        severity: Severity,
    ) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            substance_a,
            substance_b,
            interaction_type: None,
            severity,
            severity_raw: Some(severity.to_string()),
            confidence: Confidence::Unspecified,
            confidence_raw: None,
            summary: String::new(),
            mechanism: None,
            clinical_effect: None,
            management: None,
            evidence_grade: None,
            citations: Vec::new(),
        }
    }

    /// Set confidence from a raw label or number.
    pub fn with_confidence(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.confidence = Confidence::parse(&raw);
        self.confidence_raw = Some(raw);
        self
    }

    /// Numeric confidence on a 0–100 scale, when the record carries a number.
    pub fn confidence_percent(&self) -> Option<f64> {
        self.confidence_raw.as_deref().and_then(super::confidence_percent)
    }

    /// Check whether this record involves the given substance id.
    pub fn involves(&self, substance_id: &str) -> bool {
        self.substance_a.id == substance_id || self.substance_b.id == substance_id
    }

    /// Traffic-light label for result cards.
    pub fn safety_label(&self) -> SafetyLabel {
        SafetyLabel::new(self.severity, self.evidence_grade.as_deref())
    }

    /// Sort key: severity first, then confidence.
    pub fn sort_key(&self) -> (u8, u8) {
        (self.severity.rank(), self.confidence.rank())
    }
}

/// Wire shape of an interaction row.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct InteractionRecord {
    interaction_id: String,
    #[serde(default)]
    substance_a: SubstanceRef,
    #[serde(default)]
    substance_b: SubstanceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interaction_type: Option<String>,
    /// Clinical vocabulary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity_norm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity_raw: Option<String>,
    /// Consumer vocabulary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    confidence: Value,
    #[serde(default)]
    summary_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clinical_effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    management: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evidence_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    citations: Value,
}

impl From<InteractionRecord> for Interaction {
    fn from(rec: InteractionRecord) -> Self {
        let severity_source = non_empty(rec.severity_norm)
            .or_else(|| non_empty(rec.severity.clone()));
        let severity = severity_source
            .as_deref()
            .map(Severity::parse)
            .unwrap_or(Severity::Unknown);
        let severity_raw = non_empty(rec.severity_raw).or(severity_source);

        let confidence_raw = match rec.confidence {
            Value::String(s) => non_empty(Some(s)),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        let confidence = confidence_raw
            .as_deref()
            .map(Confidence::parse)
            .unwrap_or(Confidence::Unspecified);

        Interaction {
            interaction_id: rec.interaction_id,
            substance_a: rec.substance_a,
            substance_b: rec.substance_b,
            interaction_type: rec.interaction_type,
            severity,
            severity_raw,
            confidence,
            confidence_raw,
            summary: rec.summary_short,
            mechanism: rec.mechanism,
            clinical_effect: rec.clinical_effect,
            management: rec.management,
            evidence_grade: rec.evidence_grade,
            citations: citation_strings(rec.citations),
        }
    }
}

impl From<Interaction> for InteractionRecord {
    fn from(i: Interaction) -> Self {
        InteractionRecord {
            interaction_id: i.interaction_id,
            substance_a: i.substance_a,
            substance_b: i.substance_b,
            interaction_type: i.interaction_type,
            severity_norm: Some(i.severity.to_string()),
            severity_raw: i.severity_raw,
            severity: Some(i.severity.consumer().label().to_lowercase()),
            confidence: i.confidence_raw.map(Value::String).unwrap_or(Value::Null),
            summary_short: i.summary,
            mechanism: i.mechanism,
            clinical_effect: i.clinical_effect,
            management: i.management,
            evidence_grade: i.evidence_grade,
            citations: if i.citations.is_empty() {
                Value::Null
            } else {
                Value::Array(i.citations.into_iter().map(Value::String).collect())
            },
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Citations come as strings, objects with a title/url, or a single string.
fn citation_strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(citation_text).collect(),
        other => citation_text(other).into_iter().collect(),
    }
}

fn citation_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Object(map) => ["title", "citation", "url", "pmid"]
            .iter()
            .find_map(|k| map.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        _ => None,
    }
}
