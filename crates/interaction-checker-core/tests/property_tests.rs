//! Property tests for normalization, pairing and ranking.

use interaction_checker_core::engine::{generate_pairs, merge_unique, sort_by_severity};
use interaction_checker_core::models::{Interaction, Severity, StackPair, SubstanceRef};
use interaction_checker_core::resolver::normalize_token;
use interaction_checker_core::{Substance, SubstanceType};
use proptest::prelude::*;

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

fn interaction(id: usize, severity: Severity) -> Interaction {
    Interaction::new(format!("I_{id}"), SubstanceRef::default(), SubstanceRef::default(), severity)
}

proptest! {
    #[test]
    fn normalize_is_idempotent(input in "\\PC{0,40}") {
        let once = normalize_token(&input);
        prop_assert_eq!(normalize_token(once.as_str()), once);
    }

    #[test]
    fn normalize_output_alphabet(input in "\\PC{0,40}") {
        let token = normalize_token(&input);
        prop_assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || c == ' '));
        prop_assert!(!token.as_str().starts_with(' '));
        prop_assert!(!token.as_str().ends_with(' '));
        prop_assert!(!token.as_str().contains("  "));
    }

    #[test]
    fn pair_count_is_n_choose_2(n in 0usize..12) {
        let stack: Vec<Substance> = (0..n)
            .map(|i| Substance::new(format!("S{i}"), format!("Sub {i}"), format!("sub {i}"), SubstanceType::Supplement))
            .collect();
        let pairs = generate_pairs(&stack);
        prop_assert_eq!(pairs.len(), n * n.saturating_sub(1) / 2);
        for pair in &pairs {
            prop_assert_ne!(&pair.substance_a.substance_id, &pair.substance_b.substance_id);
        }
    }

    #[test]
    fn pair_tokens_ignore_order(a in "\\PC{1,30}", b in "\\PC{1,30}") {
        let sa = Substance::new("S_A", a.clone(), a, SubstanceType::Supplement);
        let sb = Substance::new("S_B", b.clone(), b, SubstanceType::Drug);

        let tokens = |pair: &StackPair| {
            let mut t = vec![pair.token_a.as_str().to_string(), pair.token_b.as_str().to_string()];
            t.sort();
            t
        };
        prop_assert_eq!(tokens(&StackPair::new(&sa, &sb)), tokens(&StackPair::new(&sb, &sa)));
    }

    #[test]
    fn sorted_results_are_unique_and_ordered(
        rows in prop::collection::vec((0usize..8, severity()), 0..30)
    ) {
        let per_pair: Vec<Vec<Interaction>> = rows
            .chunks(3)
            .map(|chunk| chunk.iter().map(|(id, s)| interaction(*id, *s)).collect())
            .collect();

        let mut merged = merge_unique(per_pair);
        sort_by_severity(&mut merged);

        let mut ids: Vec<&str> = merged.iter().map(|i| i.interaction_id.as_str()).collect();
        let len = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), len);

        for window in merged.windows(2) {
            prop_assert!(window[0].severity.rank() <= window[1].severity.rank());
        }
    }
}
