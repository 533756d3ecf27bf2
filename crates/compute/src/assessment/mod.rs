//! Assessment of rules against a dataset, and the ranking operations the
//! pipeline applies between stages.
//!
//! An [`Assessment`] is a list of [`RuleAssessment`]s over one dataset.
//! [`Assessment::sort`] ranks them by the experiment's sort order,
//! [`Assessment::refine`] drops redundant rules and moves `true()` to the
//! end, and [`Assessment::truncate_rule_assessments`] keeps the top few.

mod assessor;


use std::cmp::Ordering;
use std::collections::HashSet;

use indexmap::IndexMap;
use rulehunter_core::Value;
use rulehunter_rules::Rule;
use serde::{Deserialize, Serialize};

use crate::error::AssessError;
use crate::goal::GoalAssessment;

pub use assessor::Assessor;

pub type Result<T> = std::result::Result<T, AssessError>;

// ── Sort order ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub aggregator: String,
    pub direction: Direction,
}

// ── Assessment ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RuleAssessment {
    pub rule: Rule,
    pub aggregators: IndexMap<String, Value>,
    pub goals: Vec<GoalAssessment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub num_records: u64,
    pub rule_assessments: Vec<RuleAssessment>,
    sorted: bool,
    refined: bool,
}

impl Assessment {
    pub fn new(num_records: u64, rule_assessments: Vec<RuleAssessment>) -> Self {
        Self {
            num_records,
            rule_assessments,
            sorted: false,
            refined: false,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn is_refined(&self) -> bool {
        self.refined
    }

    /// Rules other than `true()`, in their current order.
    pub fn rules(&self) -> Vec<Rule> {
        self.rule_assessments
            .iter()
            .filter(|ra| !ra.rule.is_true_rule())
            .map(|ra| ra.rule.clone())
            .collect()
    }

    pub fn true_assessment(&self) -> Option<&RuleAssessment> {
        self.rule_assessments.iter().find(|ra| ra.rule.is_true_rule())
    }

    /// Append another assessment of the same dataset.
    pub fn merge(&mut self, other: Assessment) -> Result<()> {
        if self.num_records != other.num_records {
            return Err(AssessError::NumRecordsMismatch(
                self.num_records,
                other.num_records,
            ));
        }
        self.rule_assessments.extend(other.rule_assessments);
        self.sorted = false;
        self.refined = false;
        Ok(())
    }

    /// Rank by aggregator values in the given directions; ties go to the
    /// shorter rule, then to the lexicographically smaller one.
    pub fn sort(&mut self, order: &[SortField]) {
        let mut keyed: Vec<(String, RuleAssessment)> = self
            .rule_assessments
            .drain(..)
            .map(|ra| (ra.rule.to_string(), ra))
            .collect();
        keyed.sort_by(|(sa, a), (sb, b)| {
            compare_aggregators(a, b, order)
                .then_with(|| sa.len().cmp(&sb.len()))
                .then_with(|| sa.cmp(sb))
        });
        self.rule_assessments = keyed.into_iter().map(|(_, ra)| ra).collect();
        self.sorted = true;
        self.refined = false;
    }

    /// Drop rules that add nothing over a better-ranked one: duplicates,
    /// rules whose aggregator values equal the previous kept rule's or
    /// `true()`'s, and rules overlapping a kept rule. `true()` ends up last,
    /// exactly once.
    pub fn refine(&mut self) -> Result<()> {
        if !self.sorted {
            return Err(AssessError::NotSorted);
        }
        let true_ra = self.true_assessment().cloned();
        let mut seen = HashSet::new();
        let mut kept: Vec<RuleAssessment> = Vec::with_capacity(self.rule_assessments.len());

        for ra in self.rule_assessments.drain(..) {
            if ra.rule.is_true_rule() || !seen.insert(ra.rule.to_string()) {
                continue;
            }
            if true_ra
                .as_ref()
                .is_some_and(|t| t.aggregators == ra.aggregators)
            {
                continue;
            }
            if kept.last().is_some_and(|k| k.aggregators == ra.aggregators) {
                continue;
            }
            if kept.iter().any(|k| k.rule.overlaps(&ra.rule)) {
                continue;
            }
            kept.push(ra);
        }
        kept.extend(true_ra);

        self.rule_assessments = kept;
        self.refined = true;
        Ok(())
    }

    /// Keep the best `n − 1` rules plus the terminal `true()`. `n == 0`
    /// empties the assessment.
    pub fn truncate_rule_assessments(&mut self, n: usize) -> Result<()> {
        if !self.sorted {
            return Err(AssessError::NotSorted);
        }
        if !self.refined {
            return Err(AssessError::NotRefined);
        }
        if n == 0 {
            self.rule_assessments.clear();
            return Ok(());
        }
        let has_true = self
            .rule_assessments
            .last()
            .is_some_and(|ra| ra.rule.is_true_rule());
        if !has_true {
            self.rule_assessments.truncate(n);
            return Ok(());
        }
        let keep = n.saturating_sub(1);
        let last = self.rule_assessments.len() - 1;
        if keep < last {
            self.rule_assessments.drain(keep..last);
        }
        Ok(())
    }
}

fn compare_aggregators(a: &RuleAssessment, b: &RuleAssessment, order: &[SortField]) -> Ordering {
    for field in order {
        let ord = match (a.aggregators.get(&field.aggregator), b.aggregators.get(&field.aggregator)) {
            (Some(x), Some(y)) => x.compare(y),
            _ => Ordering::Equal,
        };
        let ord = match field.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
