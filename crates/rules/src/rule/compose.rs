//! Boolean composition of rules.
//!
//! Composites never include `true()`, a rule with itself, or a composite
//! with one of its own parts. Two single-field rules on the same field are
//! folded into one rule where that's meaningful (`BetweenFV`, `OutsideFV`,
//! `InFV`) and rejected where the result would be redundant or
//! contradictory.

use std::collections::HashSet;

use rulehunter_core::Value;

use super::error::{Result, RuleError};
use super::field_value::{BetweenFV, InFV, OutsideFV};
use super::Rule;

/// `a && b`
pub fn and(a: &Rule, b: &Rule) -> Result<Rule> {
    check_parts(a, b, "And")?;
    if let Some(field) = shared_field(a, b) {
        return and_same_field(field, a, b);
    }
    Ok(composite(a, b, Rule::And))
}

/// `a || b`
pub fn or(a: &Rule, b: &Rule) -> Result<Rule> {
    check_parts(a, b, "Or")?;
    if let Some(field) = shared_field(a, b) {
        return or_same_field(field, a, b);
    }
    Ok(composite(a, b, Rule::Or))
}

/// Every legal `And` and `Or` of pairs from `rules`, taken in the given
/// order, stopping once `max` distinct candidates have been produced.
pub fn combine(rules: &[Rule], max: usize) -> Vec<Rule> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            for candidate in [and(a, b), or(a, b)] {
                if out.len() >= max {
                    return out;
                }
                if let Ok(rule) = candidate {
                    if seen.insert(rule.to_string()) {
                        out.push(rule);
                    }
                }
            }
        }
    }
    out
}

fn composite(a: &Rule, b: &Rule, make: fn(Box<Rule>, Box<Rule>) -> Rule) -> Rule {
    let (first, second) = if a.to_string() <= b.to_string() {
        (a, b)
    } else {
        (b, a)
    };
    make(Box::new(first.clone()), Box::new(second.clone()))
}

fn check_parts(a: &Rule, b: &Rule, op: &str) -> Result<()> {
    if a.is_true_rule() || b.is_true_rule() {
        return Err(RuleError::Compose(format!("can't {} with true()", op)));
    }
    let (sa, sb) = (a.to_string(), b.to_string());
    if sa == sb {
        return Err(RuleError::Compose(format!("can't {} rule with itself: {}", op, sa)));
    }
    if parts(a).contains(&sb) || parts(b).contains(&sa) {
        return Err(RuleError::Compose(format!(
            "can't {} composite with its own part: ({}) ({})",
            op, sa, sb
        )));
    }
    Ok(())
}

/// Canonical strings of every rule nested inside a composite.
fn parts(rule: &Rule) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_parts(rule, &mut out);
    out
}

fn collect_parts(rule: &Rule, out: &mut HashSet<String>) {
    if let Rule::And(x, y) | Rule::Or(x, y) = rule {
        for part in [x, y] {
            out.insert(part.to_string());
            collect_parts(part, out);
        }
    }
}

/// The field both rules test, when both are single-field value rules on
/// the same field.
fn shared_field<'r>(a: &'r Rule, b: &Rule) -> Option<&'r str> {
    let fa = a.value_rule_field()?;
    let fb = b.value_rule_field()?;
    (fa == fb).then_some(fa)
}

fn and_same_field(field: &str, a: &Rule, b: &Rule) -> Result<Rule> {
    match (a, b) {
        (Rule::GeFV(ge), Rule::LeFV(le)) | (Rule::LeFV(le), Rule::GeFV(ge)) => {
            BetweenFV::new(field, ge.value.clone(), le.value.clone())
                .map(Rule::BetweenFV)
                .map_err(|_| {
                    RuleError::Compose(format!("contradictory And: ({}) ({})", a, b))
                })
        }
        (Rule::NeFV(_), Rule::NeFV(_)) => Ok(composite(a, b, Rule::And)),
        _ => Err(RuleError::Compose(format!(
            "redundant or contradictory And on field {}: ({}) ({})",
            field, a, b
        ))),
    }
}

fn or_same_field(field: &str, a: &Rule, b: &Rule) -> Result<Rule> {
    let rejected = || {
        RuleError::Compose(format!(
            "redundant or contradictory Or on field {}: ({}) ({})",
            field, a, b
        ))
    };
    match (a, b) {
        (Rule::GeFV(ge), Rule::LeFV(le)) | (Rule::LeFV(le), Rule::GeFV(ge)) => {
            OutsideFV::new(field, le.value.clone(), ge.value.clone())
                .map(Rule::OutsideFV)
                .map_err(|_| rejected())
        }
        (Rule::InFV(x), Rule::InFV(y)) => {
            let union = x.union(y.values())?;
            if union.values().len() == x.values().len().max(y.values().len()) {
                return Err(rejected());
            }
            Ok(Rule::InFV(union))
        }
        (Rule::EqFV(x), Rule::EqFV(y)) => {
            Ok(Rule::InFV(InFV::new(field, vec![x.value.clone(), y.value.clone()])?))
        }
        (Rule::EqFV(eq), Rule::InFV(set)) | (Rule::InFV(set), Rule::EqFV(eq)) => {
            if set.contains(&eq.value) {
                return Err(rejected());
            }
            Ok(Rule::InFV(set.union(std::slice::from_ref::<Value>(&eq.value))?))
        }
        _ => Err(rejected()),
    }
}
