//! Severity and confidence domains.
//!
//! Interaction records arrive in two vocabularies: the clinical one
//! (`major`, `moderate`, `minor`, `monitor`) and the consumer one (`avoid`,
//! `caution`, `monitor`, `info`). Both parse into the single [`Severity`]
//! enum; each view gets its own mapping function.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical severity of an interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Major,
    Moderate,
    Minor,
    Monitor,
    Info,
    Unknown,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 6] = [
        Severity::Major,
        Severity::Moderate,
        Severity::Minor,
        Severity::Monitor,
        Severity::Info,
        Severity::Unknown,
    ];

    /// Parse either vocabulary. Unrecognized values become `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "major" | "avoid" | "contraindicated" | "severe" => Severity::Major,
            "moderate" | "caution" => Severity::Moderate,
            "minor" => Severity::Minor,
            "monitor" => Severity::Monitor,
            "info" | "none" | "no interaction" => Severity::Info,
            _ => Severity::Unknown,
        }
    }

    /// Sort rank, lower is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Major => 0,
            Severity::Moderate => 1,
            Severity::Minor => 2,
            Severity::Monitor => 3,
            Severity::Info => 4,
            Severity::Unknown => 5,
        }
    }

    /// Clinical view label.
    pub fn clinical_label(&self) -> &'static str {
        match self {
            Severity::Major => "Major",
            Severity::Moderate => "Moderate",
            Severity::Minor => "Minor",
            Severity::Monitor => "Monitor",
            Severity::Info => "No Interaction",
            Severity::Unknown => "Unknown",
        }
    }

    /// Consumer view bucket.
    pub fn consumer(&self) -> ConsumerSeverity {
        match self {
            Severity::Major => ConsumerSeverity::Avoid,
            Severity::Moderate => ConsumerSeverity::Caution,
            Severity::Minor | Severity::Monitor => ConsumerSeverity::Monitor,
            Severity::Info | Severity::Unknown => ConsumerSeverity::Info,
        }
    }

    /// Risk label used by result cards.
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            Severity::Major => RiskLevel::High,
            Severity::Moderate => RiskLevel::Medium,
            Severity::Minor | Severity::Monitor => RiskLevel::Low,
            Severity::Info | Severity::Unknown => RiskLevel::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Major => "major",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
            Severity::Monitor => "monitor",
            Severity::Info => "info",
            Severity::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Consumer-facing severity vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerSeverity {
    Avoid,
    Caution,
    Monitor,
    Info,
}

impl ConsumerSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            ConsumerSeverity::Avoid => "Avoid",
            ConsumerSeverity::Caution => "Caution",
            ConsumerSeverity::Monitor => "Monitor",
            ConsumerSeverity::Info => "Info",
        }
    }
}

/// Coarse risk label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Unknown => "Unknown",
        }
    }
}

/// Confidence in an interaction record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Moderate,
    Low,
    Unspecified,
}

impl Confidence {
    /// Parse a label (`high`, `moderate`/`medium`, `low`) or a number on a
    /// 0–1 or 0–100 scale.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "high" => return Confidence::High,
            "moderate" | "medium" => return Confidence::Moderate,
            "low" => return Confidence::Low,
            _ => {}
        }
        match confidence_percent(&lower) {
            Some(p) if p >= 80.0 => Confidence::High,
            Some(p) if p >= 50.0 => Confidence::Moderate,
            Some(_) => Confidence::Low,
            None => Confidence::Unspecified,
        }
    }

    /// Sort rank, lower is more confident.
    pub fn rank(&self) -> u8 {
        match self {
            Confidence::High => 0,
            Confidence::Moderate => 1,
            Confidence::Low => 2,
            Confidence::Unspecified => 3,
        }
    }
}

/// Numeric confidence on a 0–100 scale, if the raw value is a number.
pub fn confidence_percent(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().trim_end_matches('%').parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(if value <= 1.0 { value * 100.0 } else { value.min(100.0) })
}

/// Traffic-light safety grade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SafetyGrade {
    Green,
    Yellow,
    Red,
}

/// Grade plus evidence-derived confidence, with display labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyLabel {
    pub grade: SafetyGrade,
    pub confidence: Confidence,
    pub grade_label: String,
    pub confidence_label: String,
}

impl SafetyLabel {
    /// Derive a label from severity and free-text evidence description.
    pub fn new(severity: Severity, evidence: Option<&str>) -> Self {
        let (grade, grade_label) = match severity {
            Severity::Major => (SafetyGrade::Red, "Avoid"),
            Severity::Moderate | Severity::Monitor => (SafetyGrade::Yellow, "Use Caution"),
            _ => (SafetyGrade::Green, "Low Risk"),
        };
        let confidence = evidence_confidence(evidence);
        let confidence_label = match confidence {
            Confidence::High => "High confidence",
            Confidence::Moderate => "Medium confidence",
            _ => "Low confidence",
        };
        Self {
            grade,
            confidence,
            grade_label: grade_label.to_string(),
            confidence_label: confidence_label.to_string(),
        }
    }
}

const HIGH_EVIDENCE: &[&str] = &[
    "systematic review",
    "meta-analysis",
    "multiple rct",
    "strong evidence",
    "well-established",
    "randomized controlled trial",
];

const MEDIUM_EVIDENCE: &[&str] = &[
    "rct",
    "clinical trial",
    "observational",
    "moderate evidence",
    "cohort study",
    "case-control",
];

fn evidence_confidence(evidence: Option<&str>) -> Confidence {
    let Some(ev) = evidence.map(str::to_lowercase) else {
        return Confidence::Low;
    };
    if HIGH_EVIDENCE.iter().any(|kw| ev.contains(kw)) {
        Confidence::High
    } else if MEDIUM_EVIDENCE.iter().any(|kw| ev.contains(kw)) {
        Confidence::Moderate
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_vocabularies_parse() {
        assert_eq!(Severity::parse("Major"), Severity::Major);
        assert_eq!(Severity::parse("avoid"), Severity::Major);
        assert_eq!(Severity::parse("CAUTION"), Severity::Moderate);
        assert_eq!(Severity::parse("monitor"), Severity::Monitor);
        assert_eq!(Severity::parse("info"), Severity::Info);
        assert_eq!(Severity::parse("weird"), Severity::Unknown);
        assert_eq!(Severity::parse(""), Severity::Unknown);
    }

    #[test]
    fn test_rank_order_matches_enum_order() {
        for pair in Severity::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_view_mappings() {
        assert_eq!(Severity::Major.consumer(), ConsumerSeverity::Avoid);
        assert_eq!(Severity::Minor.consumer(), ConsumerSeverity::Monitor);
        assert_eq!(Severity::Unknown.consumer(), ConsumerSeverity::Info);
        assert_eq!(Severity::Moderate.risk_level(), RiskLevel::Medium);
        assert_eq!(Severity::Monitor.risk_level(), RiskLevel::Low);
        assert_eq!(Severity::Info.clinical_label(), "No Interaction");
    }

    #[test]
    fn test_confidence_labels_and_numbers() {
        assert_eq!(Confidence::parse("high"), Confidence::High);
        assert_eq!(Confidence::parse("Medium"), Confidence::Moderate);
        assert_eq!(Confidence::parse("0.9"), Confidence::High);
        assert_eq!(Confidence::parse("65"), Confidence::Moderate);
        assert_eq!(Confidence::parse("12%"), Confidence::Low);
        assert_eq!(Confidence::parse("n/a"), Confidence::Unspecified);
        assert!(Confidence::High.rank() < Confidence::Unspecified.rank());
    }

    #[test]
    fn test_confidence_percent_scales() {
        assert_eq!(confidence_percent("0.5"), Some(50.0));
        assert_eq!(confidence_percent("75"), Some(75.0));
        assert_eq!(confidence_percent("250"), Some(100.0));
        assert_eq!(confidence_percent("-1"), None);
        assert_eq!(confidence_percent("high"), None);
    }

    #[test]
    fn test_safety_label() {
        let label = SafetyLabel::new(Severity::Major, Some("Systematic review of 12 trials"));
        assert_eq!(label.grade, SafetyGrade::Red);
        assert_eq!(label.grade_label, "Avoid");
        assert_eq!(label.confidence, Confidence::High);

        let label = SafetyLabel::new(Severity::Minor, None);
        assert_eq!(label.grade, SafetyGrade::Green);
        assert_eq!(label.confidence_label, "Low confidence");

        let label = SafetyLabel::new(Severity::Monitor, Some("one cohort study"));
        assert_eq!(label.grade, SafetyGrade::Yellow);
        assert_eq!(label.confidence, Confidence::Moderate);
    }
}
