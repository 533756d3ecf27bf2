use std::collections::HashSet;

use crate::rule::Rule;

/// Canonical strings of every rule already assessed in one experiment, so
/// later stages don't assess the same rule twice.
#[derive(Debug, Default)]
pub struct RuleTracker {
    seen: HashSet<String>,
}

impl RuleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `rules` and return only those not seen before, in their
    /// original order and without duplicates.
    pub fn track(&mut self, rules: Vec<Rule>) -> Vec<Rule> {
        rules
            .into_iter()
            .filter(|r| self.seen.insert(r.to_string()))
            .collect()
    }

    pub fn is_tracked(&self, rule: &Rule) -> bool {
        self.seen.contains(&rule.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
