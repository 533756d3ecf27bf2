//! Rule algebra.
//!
//! A [`Rule`] is a boolean predicate over one record. Its canonical string
//! (`Display`) is the identity used for deduplication and ordering
//! throughout the pipeline: two rules are the same rule iff their canonical
//! strings match.
//!
//! Optional capabilities are traits implemented by the variant payloads and
//! reached through `as_*` accessors:
//! - [`Tweakable`]: nearby candidates around numeric pivots
//! - [`DPReducible`]: pivots rounded to fewer decimal places
//! - [`Overlapping`]: whether two rules cover related records
//! - [`Valued`]: the literal a rule compares against

mod arith;
pub mod compose;
mod count;
mod dynamic;
mod error;
mod field_field;
mod field_value;
pub mod points;

#[cfg(test)]
mod tests;

use std::fmt;

use rulehunter_core::{Description, Record, Value};

pub use arith::{ArithFV, ArithOp, Bound};
pub use compose::{and, combine, or};
pub use count::{CountCmp, CountVF};
pub use dynamic::DynamicRule;
pub use error::{Result, RuleError};
pub use field_field::{CompareOp, FieldField};
pub use field_value::{BetweenFV, EqFV, GeFV, InFV, LeFV, NeFV, OutsideFV};

// ── Capabilities ────────────────────────────────────────────────────

pub trait Tweakable {
    /// Candidates around the rule's pivots for the given tweak stage (1..).
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule>;
}

pub trait DPReducible {
    fn reduce_dp(&self) -> Vec<Rule>;
}

pub trait Overlapping {
    fn overlaps(&self, other: &Rule) -> bool;
}

pub trait Valued {
    fn value(&self) -> &Value;
}

// ── Rule ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    True,
    EqFV(EqFV),
    NeFV(NeFV),
    GeFV(GeFV),
    LeFV(LeFV),
    BetweenFV(BetweenFV),
    OutsideFV(OutsideFV),
    InFV(InFV),
    FieldField(FieldField),
    Arith(ArithFV),
    Count(CountVF),
    And(Box<Rule>, Box<Rule>),
    Or(Box<Rule>, Box<Rule>),
    Dynamic(DynamicRule),
}

/// Variant tag, used to key generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    True,
    EqFV,
    NeFV,
    GeFV,
    LeFV,
    BetweenFV,
    OutsideFV,
    InFV,
    EqFF,
    NeFF,
    GeFF,
    LeFF,
    GtFF,
    LtFF,
    AddLeF,
    AddGeF,
    MulLeF,
    MulGeF,
    CountLtVF,
    CountNeVF,
    And,
    Or,
    Dynamic,
}

impl Rule {
    /// Parse a user-supplied rule. `true()` is the True rule; anything else
    /// becomes a dynamic rule over the expression.
    pub fn parse(src: &str) -> Result<Rule> {
        let src = src.trim();
        if src == "true()" {
            return Ok(Rule::True);
        }
        Ok(Rule::Dynamic(DynamicRule::new(src)?))
    }

    pub fn is_true_rule(&self) -> bool {
        matches!(self, Rule::True)
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        match self {
            Rule::True => Ok(true),
            Rule::EqFV(r) => r.is_true(record),
            Rule::NeFV(r) => r.is_true(record),
            Rule::GeFV(r) => r.is_true(record),
            Rule::LeFV(r) => r.is_true(record),
            Rule::BetweenFV(r) => r.is_true(record),
            Rule::OutsideFV(r) => r.is_true(record),
            Rule::InFV(r) => r.is_true(record),
            Rule::FieldField(r) => r.is_true(record),
            Rule::Arith(r) => r.is_true(record),
            Rule::Count(r) => r.is_true(record),
            Rule::And(a, b) => Ok(a.is_true(record)? && b.is_true(record)?),
            Rule::Or(a, b) => Ok(a.is_true(record)? || b.is_true(record)?),
            Rule::Dynamic(r) => r.is_true(record),
        }
    }

    /// Fields referenced, without duplicates.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Rule::True => Vec::new(),
            Rule::EqFV(r) => vec![r.field.clone()],
            Rule::NeFV(r) => vec![r.field.clone()],
            Rule::GeFV(r) => vec![r.field.clone()],
            Rule::LeFV(r) => vec![r.field.clone()],
            Rule::BetweenFV(r) => vec![r.field.clone()],
            Rule::OutsideFV(r) => vec![r.field.clone()],
            Rule::InFV(r) => vec![r.field.clone()],
            Rule::FieldField(r) => vec![r.a.clone(), r.b.clone()],
            Rule::Arith(r) => vec![r.a.clone(), r.b.clone()],
            Rule::Count(r) => r.fields.clone(),
            Rule::And(a, b) | Rule::Or(a, b) => {
                let mut fields = a.fields();
                for f in b.fields() {
                    if !fields.contains(&f) {
                        fields.push(f);
                    }
                }
                fields
            }
            Rule::Dynamic(r) => r.fields(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::True => RuleKind::True,
            Rule::EqFV(_) => RuleKind::EqFV,
            Rule::NeFV(_) => RuleKind::NeFV,
            Rule::GeFV(_) => RuleKind::GeFV,
            Rule::LeFV(_) => RuleKind::LeFV,
            Rule::BetweenFV(_) => RuleKind::BetweenFV,
            Rule::OutsideFV(_) => RuleKind::OutsideFV,
            Rule::InFV(_) => RuleKind::InFV,
            Rule::FieldField(r) => r.op.kind(),
            Rule::Arith(r) => r.kind(),
            Rule::Count(r) => r.kind(),
            Rule::And(..) => RuleKind::And,
            Rule::Or(..) => RuleKind::Or,
            Rule::Dynamic(_) => RuleKind::Dynamic,
        }
    }

    pub fn as_tweakable(&self) -> Option<&dyn Tweakable> {
        match self {
            Rule::GeFV(r) => Some(r),
            Rule::LeFV(r) => Some(r),
            Rule::BetweenFV(r) => Some(r),
            Rule::OutsideFV(r) => Some(r),
            Rule::Arith(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_dp_reducible(&self) -> Option<&dyn DPReducible> {
        match self {
            Rule::GeFV(r) => Some(r),
            Rule::LeFV(r) => Some(r),
            Rule::BetweenFV(r) => Some(r),
            Rule::OutsideFV(r) => Some(r),
            Rule::Arith(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_overlapping(&self) -> Option<&dyn Overlapping> {
        match self {
            Rule::GeFV(r) => Some(r),
            Rule::LeFV(r) => Some(r),
            Rule::BetweenFV(r) => Some(r),
            Rule::OutsideFV(r) => Some(r),
            Rule::InFV(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_valued(&self) -> Option<&dyn Valued> {
        match self {
            Rule::EqFV(r) => Some(r),
            Rule::NeFV(r) => Some(r),
            Rule::GeFV(r) => Some(r),
            Rule::LeFV(r) => Some(r),
            Rule::Arith(r) => Some(r),
            _ => None,
        }
    }

    pub fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        self.as_tweakable()
            .map_or_else(Vec::new, |r| r.tweak(desc, stage))
    }

    pub fn reduce_dp(&self) -> Vec<Rule> {
        self.as_dp_reducible().map_or_else(Vec::new, |r| r.reduce_dp())
    }

    pub fn overlaps(&self, other: &Rule) -> bool {
        self.as_overlapping().is_some_and(|r| r.overlaps(other))
    }

    /// The field of a single-field value rule (`EqFV` .. `InFV`).
    pub(crate) fn value_rule_field(&self) -> Option<&str> {
        match self {
            Rule::EqFV(r) => Some(&r.field),
            Rule::NeFV(r) => Some(&r.field),
            Rule::GeFV(r) => Some(&r.field),
            Rule::LeFV(r) => Some(&r.field),
            Rule::BetweenFV(r) => Some(&r.field),
            Rule::OutsideFV(r) => Some(&r.field),
            Rule::InFV(r) => Some(&r.field),
            _ => None,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::True => f.write_str("true()"),
            Rule::EqFV(r) => fmt::Display::fmt(r, f),
            Rule::NeFV(r) => fmt::Display::fmt(r, f),
            Rule::GeFV(r) => fmt::Display::fmt(r, f),
            Rule::LeFV(r) => fmt::Display::fmt(r, f),
            Rule::BetweenFV(r) => fmt::Display::fmt(r, f),
            Rule::OutsideFV(r) => fmt::Display::fmt(r, f),
            Rule::InFV(r) => fmt::Display::fmt(r, f),
            Rule::FieldField(r) => fmt::Display::fmt(r, f),
            Rule::Arith(r) => fmt::Display::fmt(r, f),
            Rule::Count(r) => fmt::Display::fmt(r, f),
            Rule::And(a, b) => write!(f, "({}) && ({})", a, b),
            Rule::Or(a, b) => write!(f, "({}) || ({})", a, b),
            Rule::Dynamic(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// Sort by canonical string and drop duplicates.
pub fn sort_dedup(rules: Vec<Rule>) -> Vec<Rule> {
    let mut keyed: Vec<(String, Rule)> = rules.into_iter().map(|r| (r.to_string(), r)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, r)| r).collect()
}

// ── Field access ────────────────────────────────────────────────────

pub(crate) fn lookup<'r>(
    rule: &dyn fmt::Display,
    record: &'r Record,
    field: &str,
) -> Result<&'r Value> {
    match record.get(field) {
        Some(v) if v.is_error() => Err(RuleError::IncompatibleTypes {
            rule: rule.to_string(),
            field: field.to_string(),
        }),
        Some(v) => Ok(v),
        None => Err(RuleError::InvalidRule {
            rule: rule.to_string(),
            field: field.to_string(),
        }),
    }
}

pub(crate) fn lookup_number(rule: &dyn fmt::Display, record: &Record, field: &str) -> Result<f64> {
    lookup(rule, record, field)?
        .as_f64()
        .ok_or_else(|| RuleError::IncompatibleTypes {
            rule: rule.to_string(),
            field: field.to_string(),
        })
}
