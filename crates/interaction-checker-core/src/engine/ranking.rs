//! Merge, sort and summarize pair results.

use std::collections::HashSet;

use crate::models::Interaction;

/// Flatten per-pair results in pair order, keeping the first occurrence
/// of each interaction id.
pub fn merge_unique<I>(per_pair: I) -> Vec<Interaction>
where
    I: IntoIterator<Item = Vec<Interaction>>,
{
    let mut seen = HashSet::new();
    per_pair
        .into_iter()
        .flatten()
        .filter(|i| seen.insert(i.interaction_id.clone()))
        .collect()
}

/// Most severe first, then most confident. Stable, so ties keep merge order.
pub fn sort_by_severity(interactions: &mut [Interaction]) {
    interactions.sort_by_key(Interaction::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, SubstanceRef};

    fn interaction(id: &str, severity: Severity, confidence: &str) -> Interaction {
        Interaction::new(id, SubstanceRef::default(), SubstanceRef::default(), severity)
            .with_confidence(confidence)
    }

    #[test]
    fn test_merge_dedupes_first_wins() {
        let mut dup = interaction("I_1", Severity::Minor, "low");
        dup.summary = "second copy".into();

        let merged = merge_unique(vec![
            vec![interaction("I_1", Severity::Major, "high")],
            vec![dup, interaction("I_2", Severity::Moderate, "high")],
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].severity, Severity::Major);
        assert!(merged[0].summary.is_empty());
    }

    #[test]
    fn test_sort_severity_then_confidence() {
        let mut list = vec![
            interaction("a", Severity::Minor, "high"),
            interaction("b", Severity::Major, "low"),
            interaction("c", Severity::Moderate, "high"),
            interaction("d", Severity::Major, "high"),
            interaction("e", Severity::Monitor, "high"),
            interaction("f", Severity::Unknown, "high"),
            interaction("g", Severity::Major, "high"),
        ];
        sort_by_severity(&mut list);

        let ids: Vec<&str> = list.iter().map(|i| i.interaction_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "g", "b", "c", "a", "e", "f"]);
    }
}
