//! Candidate rule generation from a dataset [`Description`].
//!
//! Generators are registered explicitly per [`RuleKind`] in a
//! [`GeneratorRegistry`]; [`GeneratorRegistry::with_defaults`] registers
//! every built-in generator. Output always contains `true()` exactly once
//! and is deduplicated and sorted by canonical string.

mod arithmetic;
mod count;
mod field_field;
mod numeric;
mod string;


use std::collections::BTreeMap;

use rulehunter_core::{Description, FieldKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rule::{sort_dedup, ArithOp, Bound, CompareOp, CountCmp, Rule, RuleKind};

/// Points per numeric partition, i.e. `min + i·(max−min)/10` for i = 0..=10.
pub const NUM_PARTITIONS: u32 = 10;

/// The `ruleGeneration` block of a train mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Fields rules may use. Empty means every Number or String field.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Also generate `a + b` and `a * b` rules.
    #[serde(default)]
    pub arithmetic: bool,
}

impl GenerationOptions {
    /// Fields to generate rules for, in name order.
    pub fn rule_fields(&self, desc: &Description) -> Vec<String> {
        desc.fields
            .iter()
            .filter(|(name, fd)| {
                matches!(fd.kind, FieldKind::Number | FieldKind::String)
                    && (self.fields.is_empty() || self.fields.contains(name))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Two explicitly declared fields allow larger `in()` sets.
    fn in_bonus(&self) -> usize {
        if self.fields.len() == 2 {
            3
        } else {
            0
        }
    }
}

/// Produces candidates of one kind.
pub trait Generator: Send + Sync {
    fn generate(&self, desc: &Description, opts: &GenerationOptions) -> Vec<Rule>;
}

impl<F> Generator for F
where
    F: Fn(&Description, &GenerationOptions) -> Vec<Rule> + Send + Sync,
{
    fn generate(&self, desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
        self(desc, opts)
    }
}

#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<RuleKind, Box<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in generator.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(RuleKind::GeFV, numeric::ge);
        reg.register(RuleKind::LeFV, numeric::le);
        reg.register(RuleKind::BetweenFV, numeric::between);
        reg.register(RuleKind::OutsideFV, numeric::outside);
        reg.register(RuleKind::EqFV, string::eq);
        reg.register(RuleKind::NeFV, string::ne);
        reg.register(RuleKind::InFV, string::in_fv);

        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Ge,
            CompareOp::Le,
            CompareOp::Gt,
            CompareOp::Lt,
        ] {
            reg.register(op.kind(), move |d: &Description, o: &GenerationOptions| {
                field_field::generate(op, d, o)
            });
        }

        for (kind, op, bound) in [
            (RuleKind::AddLeF, ArithOp::Add, Bound::Le),
            (RuleKind::AddGeF, ArithOp::Add, Bound::Ge),
            (RuleKind::MulLeF, ArithOp::Mul, Bound::Le),
            (RuleKind::MulGeF, ArithOp::Mul, Bound::Ge),
        ] {
            reg.register(kind, move |d: &Description, o: &GenerationOptions| {
                arithmetic::generate(op, bound, d, o)
            });
        }

        for (kind, cmp) in [
            (RuleKind::CountLtVF, CountCmp::Lt),
            (RuleKind::CountNeVF, CountCmp::Ne),
        ] {
            reg.register(kind, move |d: &Description, o: &GenerationOptions| {
                count::generate(cmp, d, o)
            });
        }
        reg
    }

    /// Add or replace the generator for `kind`.
    pub fn register(&mut self, kind: RuleKind, generator: impl Generator + 'static) {
        self.generators.insert(kind, Box::new(generator));
    }

    pub fn kinds(&self) -> Vec<RuleKind> {
        self.generators.keys().copied().collect()
    }

    /// Run every registered generator. The result includes `true()` once
    /// and is sorted by canonical string.
    pub fn generate(&self, desc: &Description, opts: &GenerationOptions) -> Vec<Rule> {
        let mut rules = vec![Rule::True];
        for (kind, generator) in &self.generators {
            let generated = generator.generate(desc, opts);
            debug!(kind = ?kind, count = generated.len(), "generated rules");
            rules.extend(generated);
        }
        sort_dedup(rules)
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Every `k`-element subset of `items`, preserving order.
pub(crate) fn subsets<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i].clone()).collect());
        // Advance the rightmost index that still has room.
        let Some(pos) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            return out;
        };
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
