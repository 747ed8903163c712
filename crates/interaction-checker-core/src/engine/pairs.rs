//! Pair generation.

use crate::models::{StackPair, Substance};
use crate::resolver::normalize_token;

impl StackPair {
    /// Pair two substances, deriving lookup tokens from their canonical names.
    pub fn new(a: &Substance, b: &Substance) -> Self {
        Self {
            token_a: normalize_token(&a.canonical_name),
            token_b: normalize_token(&b.canonical_name),
            substance_a: a.clone(),
            substance_b: b.clone(),
        }
    }
}

/// Every unordered pair of distinct positions, in input order:
/// (0,1), (0,2), ..., (1,2), ...
pub fn generate_pairs(stack: &[Substance]) -> Vec<StackPair> {
    let n = stack.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push(StackPair::new(&stack[i], &stack[j]));
        }
    }
    pairs
}

/// Every element of `left` against every element of `right`.
pub fn generate_cross_pairs(left: &[Substance], right: &[Substance]) -> Vec<StackPair> {
    left.iter()
        .flat_map(|a| right.iter().map(move |b| StackPair::new(a, b)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubstanceType;

    fn stack(n: usize) -> Vec<Substance> {
        (0..n)
            .map(|i| Substance::new(format!("S{i}"), format!("Sub {i}"), format!("sub {i}"), SubstanceType::Supplement))
            .collect()
    }

    #[test]
    fn test_pair_counts() {
        assert_eq!(generate_pairs(&stack(0)).len(), 0);
        assert_eq!(generate_pairs(&stack(1)).len(), 0);
        assert_eq!(generate_pairs(&stack(2)).len(), 1);
        assert_eq!(generate_pairs(&stack(4)).len(), 6);
        assert_eq!(generate_pairs(&stack(10)).len(), 45);
    }

    #[test]
    fn test_pair_order() {
        let pairs = generate_pairs(&stack(3));
        let ids: Vec<(&str, &str)> = pairs
            .iter()
            .map(|p| (p.substance_a.substance_id.as_str(), p.substance_b.substance_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("S0", "S1"), ("S0", "S2"), ("S1", "S2")]);
    }

    #[test]
    fn test_tokens_from_canonical_name() {
        let a = Substance::new("S_VITK", "Vitamin K (K1)", "Vitamin  K", SubstanceType::Supplement);
        let b = Substance::new("S_WARF", "Coumadin", "Warfarin", SubstanceType::Drug);
        let pair = StackPair::new(&a, &b);
        assert_eq!(pair.token_a.as_str(), "vitamin k");
        assert_eq!(pair.token_b.as_str(), "warfarin");
        assert_eq!(pair.label(), "Vitamin K (K1) + Coumadin");
    }

    #[test]
    fn test_cross_pairs() {
        let supplements = stack(2);
        let drugs = vec![
            Substance::new("D0", "Drug 0", "drug 0", SubstanceType::Drug),
            Substance::new("D1", "Drug 1", "drug 1", SubstanceType::Drug),
            Substance::new("D2", "Drug 2", "drug 2", SubstanceType::Drug),
        ];
        let pairs = generate_cross_pairs(&supplements, &drugs);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0].substance_b.substance_id, "D0");
        assert_eq!(pairs[3].substance_a.substance_id, "S1");
        assert!(generate_cross_pairs(&supplements, &[]).is_empty());
    }
}
