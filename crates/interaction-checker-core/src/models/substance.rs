//! Substance catalog models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Whether a substance is a drug or a supplement.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubstanceType {
    Drug,
    Supplement,
}

impl SubstanceType {
    /// Wire string used by the catalog API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubstanceType::Drug => "drug",
            SubstanceType::Supplement => "supplement",
        }
    }
}

impl fmt::Display for SubstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubstanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drug" | "medication" | "medicine" | "rx" => Ok(SubstanceType::Drug),
            "supplement" => Ok(SubstanceType::Supplement),
            other => Err(format!("unknown substance type: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for SubstanceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A drug or supplement as served by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Substance {
    /// Stable identifier, unique across the catalog
    pub substance_id: String,
    /// Human-facing name
    pub display_name: String,
    /// Name used to derive the lookup token
    pub canonical_name: String,
    /// Drug or supplement
    #[serde(rename = "type")]
    pub kind: SubstanceType,
    /// Alternate names (brand names, spellings)
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Substance {
    /// Create a substance with no aliases.
    pub fn new(
        substance_id: impl Into<String>,
        display_name: impl Into<String>,
        canonical_name: impl Into<String>,
        kind: SubstanceType,
    ) -> Self {
        Self {
            substance_id: substance_id.into(),
            display_name: display_name.into(),
            canonical_name: canonical_name.into(),
            kind,
            aliases: Vec::new(),
        }
    }

    /// Every name this substance answers to, display name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str())
            .chain(std::iter::once(self.canonical_name.as_str()))
            .chain(self.aliases.iter().map(String::as_str))
    }

    /// Check whether this substance passes an optional type filter.
    pub fn matches_kind(&self, kind: Option<SubstanceType>) -> bool {
        kind.map_or(true, |k| k == self.kind)
    }

    /// Reference form carried by interaction records.
    pub fn to_ref(&self) -> SubstanceRef {
        SubstanceRef {
            id: self.substance_id.clone(),
            name: self.display_name.clone(),
            kind: self.kind.as_str().to_string(),
        }
    }
}

/// One side of an interaction record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubstanceRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Kept as a string; older records carry values outside drug/supplement
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl SubstanceRef {
    /// Display label, falling back when the record has no name.
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }
}

/// Format an interaction pair for display, e.g. "Vitamin K + Warfarin".
pub fn format_pair(a: &SubstanceRef, b: &SubstanceRef) -> String {
    format!("{} + {}", a.label(), b.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases_parse_as_drug() {
        assert_eq!("medication".parse::<SubstanceType>(), Ok(SubstanceType::Drug));
        assert_eq!("Rx".parse::<SubstanceType>(), Ok(SubstanceType::Drug));
        assert_eq!("supplement".parse::<SubstanceType>(), Ok(SubstanceType::Supplement));
        assert!("herb".parse::<SubstanceType>().is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "substance_id": "S_WARF",
            "display_name": "Warfarin",
            "canonical_name": "warfarin",
            "type": "drug"
        }"#;
        let s: Substance = serde_json::from_str(json).unwrap();
        assert_eq!(s.kind, SubstanceType::Drug);
        assert!(s.aliases.is_empty());

        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back["type"], "drug");
    }

    #[test]
    fn test_names_and_kind_filter() {
        let mut s = Substance::new("S1", "Fish Oil", "omega-3", SubstanceType::Supplement);
        s.aliases = vec!["EPA/DHA".into()];

        let names: Vec<&str> = s.names().collect();
        assert_eq!(names, vec!["Fish Oil", "omega-3", "EPA/DHA"]);
        assert!(s.matches_kind(None));
        assert!(s.matches_kind(Some(SubstanceType::Supplement)));
        assert!(!s.matches_kind(Some(SubstanceType::Drug)));
    }

    #[test]
    fn test_format_pair_handles_missing_names() {
        let a = SubstanceRef { id: "1".into(), name: "Vitamin D".into(), kind: "supplement".into() };
        let b = SubstanceRef::default();
        assert_eq!(format_pair(&a, &b), "Vitamin D + Unknown");
    }
}
