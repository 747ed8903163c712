//! User selections: the stack and the per-kind lists.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Substance, SubstanceType};

/// Subscription tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Premium,
    Clinical,
}

impl Tier {
    /// Parse a profile plan name. Unknown plans count as free.
    pub fn from_plan(plan: Option<&str>) -> Self {
        match plan.map(|p| p.trim().to_lowercase()).as_deref() {
            Some("pro") => Tier::Pro,
            Some("premium") => Tier::Premium,
            Some("clinical") => Tier::Clinical,
            _ => Tier::Free,
        }
    }

    /// Maximum stack size for this tier.
    pub fn max_stack_size(&self) -> usize {
        match self {
            Tier::Free => 2,
            Tier::Pro | Tier::Premium | Tier::Clinical => 4,
        }
    }

    /// Paid tiers get result filters.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }
}

/// How the stack size cap is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLimit {
    ForTier(Tier),
    Fixed(usize),
}

impl StackLimit {
    pub fn max(&self) -> usize {
        match self {
            StackLimit::ForTier(tier) => tier.max_stack_size(),
            StackLimit::Fixed(n) => *n,
        }
    }
}

impl Default for StackLimit {
    fn default() -> Self {
        StackLimit::ForTier(Tier::Free)
    }
}

/// Selection errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{0} is already selected")]
    Duplicate(String),

    #[error("You can add up to {limit} substances on your plan")]
    LimitReached { limit: usize },
}

/// Ordered, id-unique list of substances.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionSet {
    items: Vec<Substance>,
    #[serde(default)]
    capacity: Option<usize>,
}

impl SelectionSet {
    /// Unbounded selection (supplement and medication lists).
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection capped by a stack limit.
    pub fn bounded(limit: StackLimit) -> Self {
        Self {
            items: Vec::new(),
            capacity: Some(limit.max()),
        }
    }

    /// Add a substance. Duplicates and overflow are rejected without change.
    pub fn add(&mut self, substance: Substance) -> Result<(), SelectionError> {
        if self.contains(&substance.substance_id) {
            return Err(SelectionError::Duplicate(substance.display_name));
        }
        if let Some(limit) = self.capacity {
            if self.items.len() >= limit {
                return Err(SelectionError::LimitReached { limit });
            }
        }
        self.items.push(substance);
        Ok(())
    }

    /// Remove by id. Returns the removed substance, if present.
    pub fn remove(&mut self, substance_id: &str) -> Option<Substance> {
        let pos = self.items.iter().position(|s| s.substance_id == substance_id)?;
        Some(self.items.remove(pos))
    }

    pub fn contains(&self, substance_id: &str) -> bool {
        self.items.iter().any(|s| s.substance_id == substance_id)
    }

    pub fn items(&self) -> &[Substance] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|c| self.items.len() >= c)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// An input the resolver could not match, kept so the caller can offer
/// "did you mean" or "request addition".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotFoundItem {
    pub id: String,
    pub raw_name: String,
    pub kind: Option<SubstanceType>,
    pub suggestions: Vec<Substance>,
}

impl NotFoundItem {
    pub fn new(raw_name: impl Into<String>, kind: Option<SubstanceType>, suggestions: Vec<Substance>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_name: raw_name.into(),
            kind,
            suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substance(id: &str) -> Substance {
        Substance::new(id, id.to_uppercase(), id, SubstanceType::Supplement)
    }

    #[test]
    fn test_tier_caps() {
        assert_eq!(Tier::Free.max_stack_size(), 2);
        assert_eq!(Tier::Clinical.max_stack_size(), 4);
        assert_eq!(Tier::from_plan(Some("starter_free")), Tier::Free);
        assert_eq!(Tier::from_plan(Some("Premium")), Tier::Premium);
        assert_eq!(Tier::from_plan(None), Tier::Free);
        assert_eq!(StackLimit::Fixed(4).max(), 4);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut set = SelectionSet::new();
        set.add(substance("zinc")).unwrap();
        let err = set.add(substance("zinc")).unwrap_err();
        assert_eq!(err, SelectionError::Duplicate("ZINC".into()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_free_tier_stack_limit() {
        let mut set = SelectionSet::bounded(StackLimit::ForTier(Tier::Free));
        set.add(substance("a")).unwrap();
        set.add(substance("b")).unwrap();
        assert!(set.is_full());
        assert_eq!(
            set.add(substance("c")),
            Err(SelectionError::LimitReached { limit: 2 })
        );

        let removed = set.remove("a").unwrap();
        assert_eq!(removed.substance_id, "a");
        set.add(substance("c")).unwrap();
        let ids: Vec<&str> = set.items().iter().map(|s| s.substance_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_not_found_items_get_unique_ids() {
        let a = NotFoundItem::new("Xyzzyx123", None, vec![]);
        let b = NotFoundItem::new("Xyzzyx123", None, vec![]);
        assert_ne!(a.id, b.id);
    }
}
