use std::collections::BTreeMap;

use rulehunter_core::{Description, Value};

use super::GenerationOptions;
use crate::rule::{CountCmp, CountVF, Rule};

const MIN_VALUE_COUNT: u64 = 2;

/// For each value common (count ≥ 2) to at least two rule fields, count
/// rules over those fields: `< n` for n = 1..=fields, `!= n` for
/// n = 0..=fields.
pub(super) fn generate(cmp: CountCmp, desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    let mut shared: BTreeMap<String, (Value, Vec<String>)> = BTreeMap::new();
    for field in opts.rule_fields(desc) {
        let Some(fd) = desc.field(&field) else {
            continue;
        };
        for (key, vc) in &fd.values {
            if vc.num >= MIN_VALUE_COUNT {
                shared
                    .entry(key.clone())
                    .or_insert_with(|| (vc.value.clone(), Vec::new()))
                    .1
                    .push(field.clone());
            }
        }
    }

    let mut out = Vec::new();
    for (value, fields) in shared.into_values() {
        if fields.len() < 2 {
            continue;
        }
        let n = fields.len() as i64;
        let thresholds = match cmp {
            CountCmp::Lt => 1..=n,
            CountCmp::Ne => 0..=n,
        };
        for t in thresholds {
            if let Ok(rule) = CountVF::new(value.clone(), fields.clone(), cmp, t) {
                out.push(Rule::Count(rule));
            }
        }
    }
    out
}
