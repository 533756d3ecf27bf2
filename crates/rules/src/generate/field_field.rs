use rulehunter_core::{Description, FieldDescription, FieldKind};

use super::GenerationOptions;
use crate::rule::{CompareOp, FieldField, Rule};

/// Compare pairs of rule fields that could plausibly relate: numeric pairs
/// with overlapping ranges (equality only when both are integers), and
/// string pairs sharing at least one value.
pub(super) fn generate(op: CompareOp, desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
    let fields: Vec<(String, &FieldDescription)> = opts
        .rule_fields(desc)
        .into_iter()
        .filter_map(|f| desc.field(&f).map(|fd| (f, fd)))
        .collect();

    let mut out = Vec::new();
    for (i, (a, fa)) in fields.iter().enumerate() {
        for (b, fb) in &fields[i + 1..] {
            if applies(op, fa, fb) {
                if let Ok(rule) = FieldField::new(op, a.as_str(), b.as_str()) {
                    out.push(Rule::FieldField(rule));
                }
            }
        }
    }
    out
}

fn applies(op: CompareOp, fa: &FieldDescription, fb: &FieldDescription) -> bool {
    match (fa.kind, fb.kind) {
        (FieldKind::Number, FieldKind::Number) => {
            let overlapping = match (fa.bounds(), fb.bounds()) {
                (Some((amin, amax)), Some((bmin, bmax))) => amin <= bmax && bmin <= amax,
                _ => false,
            };
            match op {
                CompareOp::Eq | CompareOp::Ne => {
                    overlapping && fa.max_dp == 0 && fb.max_dp == 0
                }
                _ => overlapping,
            }
        }
        (FieldKind::String, FieldKind::String) => {
            matches!(op, CompareOp::Eq | CompareOp::Ne)
                && fa.values.keys().any(|k| fb.values.contains_key(k))
        }
        _ => false,
    }
}
