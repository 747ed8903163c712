//! Personal context notes.
//!
//! A user may flag circumstances (anticoagulant therapy, pregnancy, planned
//! surgery, blood pressure management). Serious interactions whose text
//! mentions a related keyword get an extra note for each flagged context.

use serde::{Deserialize, Serialize};

use super::{Interaction, Severity};

/// Circumstances the user has flagged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContextFlags {
    #[serde(default)]
    pub blood_thinners: bool,
    #[serde(default)]
    pub pregnancy: bool,
    #[serde(default)]
    pub surgery: bool,
    #[serde(default)]
    pub blood_pressure: bool,
}

impl ContextFlags {
    pub fn is_empty(&self) -> bool {
        !(self.blood_thinners || self.pregnancy || self.surgery || self.blood_pressure)
    }

    fn is_set(&self, kind: ContextKind) -> bool {
        match kind {
            ContextKind::BloodThinners => self.blood_thinners,
            ContextKind::Pregnancy => self.pregnancy,
            ContextKind::Surgery => self.surgery,
            ContextKind::BloodPressure => self.blood_pressure,
        }
    }
}

/// One flaggable context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    BloodThinners,
    Pregnancy,
    Surgery,
    BloodPressure,
}

impl ContextKind {
    /// Note order.
    pub const ALL: [ContextKind; 4] = [
        ContextKind::BloodThinners,
        ContextKind::Pregnancy,
        ContextKind::Surgery,
        ContextKind::BloodPressure,
    ];

    /// Lowercase keywords matched as substrings.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ContextKind::BloodThinners => &[
                "bleeding",
                "anticoagulant",
                "platelet",
                "warfarin",
                "coagulation",
                "hemorrhage",
                "bruising",
                "clotting",
            ],
            ContextKind::Pregnancy => &[
                "pregnancy",
                "pregnant",
                "fetal",
                "teratogenic",
                "embryo",
                "lactation",
                "breastfeeding",
                "conception",
            ],
            ContextKind::Surgery => &[
                "bleeding",
                "clotting",
                "anesthesia",
                "sedative",
                "surgery",
                "surgical",
                "perioperative",
                "procedure",
            ],
            ContextKind::BloodPressure => &[
                "blood pressure",
                "hypotension",
                "hypertension",
                "bradycardia",
                "tachycardia",
                "cardiovascular",
                "bp",
            ],
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ContextKind::BloodThinners => {
                "If you are taking anticoagulants, this combination may raise bleeding risk. Discuss with a qualified clinician."
            }
            ContextKind::Pregnancy => {
                "If you are pregnant or trying to conceive, this interaction may have fetal or maternal implications. Consult your healthcare provider."
            }
            ContextKind::Surgery => {
                "If you have surgery scheduled, this combination may affect bleeding, clotting, or anesthesia. Inform your surgical team and clinician."
            }
            ContextKind::BloodPressure => {
                "If you are managing blood pressure, this combination may affect cardiovascular function. Monitor with your healthcare provider."
            }
        }
    }
}

/// A note attached to an interaction for one flagged context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextNote {
    pub kind: ContextKind,
    pub message: String,
}

/// Notes for free text at a given severity. Only major and moderate
/// interactions get notes.
pub fn context_notes(text: &str, flags: &ContextFlags, severity: Severity) -> Vec<ContextNote> {
    if flags.is_empty() || !matches!(severity, Severity::Major | Severity::Moderate) {
        return Vec::new();
    }
    let text = text.to_lowercase();
    ContextKind::ALL
        .into_iter()
        .filter(|kind| flags.is_set(*kind))
        .filter(|kind| kind.keywords().iter().any(|kw| text.contains(kw)))
        .map(|kind| ContextNote {
            kind,
            message: kind.message().to_string(),
        })
        .collect()
}

impl Interaction {
    /// Context notes for this interaction's narrative.
    pub fn context_notes(&self, flags: &ContextFlags) -> Vec<ContextNote> {
        let text = [
            Some(self.summary.as_str()),
            self.mechanism.as_deref(),
            self.clinical_effect.as_deref(),
            self.management.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        context_notes(&text, flags, self.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubstanceRef;

    fn interaction(severity: Severity, summary: &str) -> Interaction {
        let mut i = Interaction::new("I_1", SubstanceRef::default(), SubstanceRef::default(), severity);
        i.summary = summary.to_string();
        i
    }

    #[test]
    fn test_no_flags_no_notes() {
        let i = interaction(Severity::Major, "Increased bleeding risk");
        assert!(i.context_notes(&ContextFlags::default()).is_empty());
    }

    #[test]
    fn test_keyword_matches_flagged_context() {
        let mut i = interaction(Severity::Major, "Increased BLEEDING risk");
        i.management = Some("Stop before surgery".into());

        let flags = ContextFlags {
            blood_thinners: true,
            surgery: true,
            pregnancy: true,
            ..Default::default()
        };
        let notes = i.context_notes(&flags);
        let kinds: Vec<ContextKind> = notes.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![ContextKind::BloodThinners, ContextKind::Surgery]);
        assert!(notes[0].message.starts_with("If you are taking anticoagulants"));
    }

    #[test]
    fn test_minor_severity_gets_no_notes() {
        let flags = ContextFlags {
            blood_pressure: true,
            ..Default::default()
        };
        let text = "May cause hypotension";
        assert!(interaction(Severity::Minor, text).context_notes(&flags).is_empty());
        assert!(interaction(Severity::Unknown, text).context_notes(&flags).is_empty());
        assert_eq!(interaction(Severity::Moderate, text).context_notes(&flags).len(), 1);
    }

    #[test]
    fn test_mechanism_text_is_searched() {
        let mut i = interaction(Severity::Moderate, "Reduced effect");
        i.mechanism = Some("Possible teratogenic activity".into());
        let flags = ContextFlags {
            pregnancy: true,
            ..Default::default()
        };
        assert_eq!(i.context_notes(&flags)[0].kind, ContextKind::Pregnancy);
    }

    #[test]
    fn test_flags_wire_form() {
        let flags: ContextFlags = serde_json::from_str(r#"{"bloodThinners": true}"#).unwrap();
        assert!(flags.blood_thinners);
        assert!(!flags.surgery);
    }
}
