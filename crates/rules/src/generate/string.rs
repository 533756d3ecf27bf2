use rulehunter_core::{Description, FieldDescription, FieldKind};

use super::{subsets, GenerationOptions};
use crate::rule::{EqFV, InFV, NeFV, Rule};

/// Values must be seen at least this often to appear in a rule.
const MIN_VALUE_COUNT: u64 = 2;
const MAX_IN_VALUES: usize = 5;
const MAX_IN_FIELD_VALUES: usize = 12;

fn string_fields<'d>(
    desc: &'d Description,
    opts: &GenerationOptions,
) -> Vec<(String, &'d FieldDescription)> {
    opts.rule_fields(desc)
        .into_iter()
        .filter_map(|field| {
            let fd = desc.field(&field)?;
            (fd.kind == FieldKind::String).then_some((field, fd))
        })
        .collect()
}

pub(super) fn eq(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    let mut out = Vec::new();
    for (field, fd) in string_fields(desc, opts) {
        for v in fd.values_with_count(MIN_VALUE_COUNT) {
            out.push(Rule::EqFV(EqFV::new(field.clone(), v.clone())));
        }
    }
    out
}

pub(super) fn ne(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    let mut out = Vec::new();
    for (field, fd) in string_fields(desc, opts) {
        for v in fd.values_with_count(MIN_VALUE_COUNT) {
            out.push(Rule::NeFV(NeFV::new(field.clone(), v.clone())));
        }
    }
    out
}

/// `in()` over subsets of the common values of small-cardinality fields.
/// A subset covering every value of the field is skipped.
pub(super) fn in_fv(desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    let bonus = opts.in_bonus();
    let max_field_values = MAX_IN_FIELD_VALUES + bonus;
    let max_in_values = MAX_IN_VALUES + bonus;

    let mut out = Vec::new();
    for (field, fd) in string_fields(desc, opts) {
        if fd.too_many_values || fd.num_values() > max_field_values {
            continue;
        }
        let values: Vec<_> = fd
            .values_with_count(MIN_VALUE_COUNT)
            .into_iter()
            .cloned()
            .collect();
        for k in 2..=max_in_values.min(values.len()) {
            if k == fd.num_values() {
                continue;
            }
            for subset in subsets(&values, k) {
                if let Ok(rule) = InFV::new(field.clone(), subset) {
                    out.push(Rule::InFV(rule));
                }
            }
        }
    }
    out
}
