use rulehunter_core::{Description, FieldKind};

use super::{GenerationOptions, NUM_PARTITIONS};
use crate::rule::points::partition;
use crate::rule::{ArithFV, ArithOp, Bound, Rule};

/// `a + b` / `a * b` against points across the combined range. Only runs
/// when arithmetic generation is switched on.
pub(super) fn generate(
    op: ArithOp,
    bound: Bound,
    desc: &Description,
    opts: &GenerationOptions,
) -> Vec<Rule> {
    if !opts.arithmetic {
        return Vec::new();
    }
    let fields: Vec<String> = opts
        .rule_fields(desc)
        .into_iter()
        .filter(|f| desc.field(f).is_some_and(|fd| fd.kind == FieldKind::Number))
        .collect();

    let mut out = Vec::new();
    for (i, a) in fields.iter().enumerate() {
        for b in &fields[i + 1..] {
            let Some((min, max, dp)) = ArithFV::range(op, desc, a, b) else {
                continue;
            };
            for p in partition(min, max, dp, NUM_PARTITIONS) {
                if let Ok(rule) = ArithFV::new(op, a.as_str(), b.as_str(), bound, p) {
                    out.push(Rule::Arith(rule));
                }
            }
        }
    }
    out
}
