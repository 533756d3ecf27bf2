//! Rules comparing one field against literal values.

use std::collections::BTreeMap;
use std::fmt;

use rulehunter_core::{Description, Record, Value};

use super::error::{Result, RuleError};
use super::points::{reduce_dp_points, tweak_points};
use super::{lookup, lookup_number, DPReducible, Overlapping, Rule, Tweakable, Valued};
use crate::expr::{equal, literal};

// ── Equality ────────────────────────────────────────────────────────

/// `field == value`
#[derive(Debug, Clone, PartialEq)]
pub struct EqFV {
    pub field: String,
    pub value: Value,
}

impl EqFV {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        Ok(equal(lookup(self, record, &self.field)?, &self.value))
    }
}

impl fmt::Display for EqFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.field, literal(&self.value))
    }
}

impl Valued for EqFV {
    fn value(&self) -> &Value {
        &self.value
    }
}

/// `field != value`
#[derive(Debug, Clone, PartialEq)]
pub struct NeFV {
    pub field: String,
    pub value: Value,
}

impl NeFV {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        Ok(!equal(lookup(self, record, &self.field)?, &self.value))
    }
}

impl fmt::Display for NeFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} != {}", self.field, literal(&self.value))
    }
}

impl Valued for NeFV {
    fn value(&self) -> &Value {
        &self.value
    }
}

// ── Thresholds ──────────────────────────────────────────────────────

/// `field >= value`
#[derive(Debug, Clone, PartialEq)]
pub struct GeFV {
    pub field: String,
    pub value: Value,
}

impl GeFV {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let v = lookup_number(self, record, &self.field)?;
        Ok(v >= pivot(self, &self.field, &self.value)?)
    }
}

impl fmt::Display for GeFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >= {}", self.field, literal(&self.value))
    }
}

impl Valued for GeFV {
    fn value(&self) -> &Value {
        &self.value
    }
}

impl Tweakable for GeFV {
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        tweak_field(desc, &self.field, &self.value, stage)
            .into_iter()
            .map(|v| Rule::GeFV(GeFV::new(&self.field, v)))
            .collect()
    }
}

impl DPReducible for GeFV {
    fn reduce_dp(&self) -> Vec<Rule> {
        reduce_dp_points(&self.value)
            .into_iter()
            .map(|v| Rule::GeFV(GeFV::new(&self.field, v)))
            .collect()
    }
}

impl Overlapping for GeFV {
    fn overlaps(&self, other: &Rule) -> bool {
        matches!(other, Rule::GeFV(o) if o.field == self.field)
    }
}

/// `field <= value`
#[derive(Debug, Clone, PartialEq)]
pub struct LeFV {
    pub field: String,
    pub value: Value,
}

impl LeFV {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let v = lookup_number(self, record, &self.field)?;
        Ok(v <= pivot(self, &self.field, &self.value)?)
    }
}

impl fmt::Display for LeFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <= {}", self.field, literal(&self.value))
    }
}

impl Valued for LeFV {
    fn value(&self) -> &Value {
        &self.value
    }
}

impl Tweakable for LeFV {
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        tweak_field(desc, &self.field, &self.value, stage)
            .into_iter()
            .map(|v| Rule::LeFV(LeFV::new(&self.field, v)))
            .collect()
    }
}

impl DPReducible for LeFV {
    fn reduce_dp(&self) -> Vec<Rule> {
        reduce_dp_points(&self.value)
            .into_iter()
            .map(|v| Rule::LeFV(LeFV::new(&self.field, v)))
            .collect()
    }
}

impl Overlapping for LeFV {
    fn overlaps(&self, other: &Rule) -> bool {
        matches!(other, Rule::LeFV(o) if o.field == self.field)
    }
}

// ── Ranges ──────────────────────────────────────────────────────────

/// `field >= low && field <= high`, with `high > low`.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenFV {
    pub field: String,
    pub low: Value,
    pub high: Value,
}

impl BetweenFV {
    pub fn new(field: impl Into<String>, low: Value, high: Value) -> Result<Self> {
        let field = field.into();
        check_range(&field, &low, &high, "between")?;
        Ok(Self { field, low, high })
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let v = lookup_number(self, record, &self.field)?;
        let low = pivot(self, &self.field, &self.low)?;
        let high = pivot(self, &self.field, &self.high)?;
        Ok(v >= low && v <= high)
    }

    fn bounds(&self) -> (f64, f64) {
        (
            self.low.as_f64().unwrap_or(f64::NAN),
            self.high.as_f64().unwrap_or(f64::NAN),
        )
    }
}

impl fmt::Display for BetweenFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{0} >= {1} && {0} <= {2}",
            self.field,
            literal(&self.low),
            literal(&self.high)
        )
    }
}

impl Tweakable for BetweenFV {
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        let lows = tweak_field(desc, &self.field, &self.low, stage);
        let highs = tweak_field(desc, &self.field, &self.high, stage);
        range_variants(&self.field, &self.low, &self.high, lows, highs, |f, l, h| {
            BetweenFV::new(f, l, h).map(Rule::BetweenFV)
        })
    }
}

impl DPReducible for BetweenFV {
    fn reduce_dp(&self) -> Vec<Rule> {
        let lows = reduce_dp_points(&self.low);
        let highs = reduce_dp_points(&self.high);
        range_variants(&self.field, &self.low, &self.high, lows, highs, |f, l, h| {
            BetweenFV::new(f, l, h).map(Rule::BetweenFV)
        })
    }
}

impl Overlapping for BetweenFV {
    fn overlaps(&self, other: &Rule) -> bool {
        match other {
            Rule::BetweenFV(o) if o.field == self.field => {
                let (a_low, a_high) = self.bounds();
                let (b_low, b_high) = o.bounds();
                a_low <= b_high && b_low <= a_high
            }
            _ => false,
        }
    }
}

/// `field <= low || field >= high`, with `low < high`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutsideFV {
    pub field: String,
    pub low: Value,
    pub high: Value,
}

impl OutsideFV {
    pub fn new(field: impl Into<String>, low: Value, high: Value) -> Result<Self> {
        let field = field.into();
        check_range(&field, &low, &high, "outside")?;
        Ok(Self { field, low, high })
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let v = lookup_number(self, record, &self.field)?;
        let low = pivot(self, &self.field, &self.low)?;
        let high = pivot(self, &self.field, &self.high)?;
        Ok(v <= low || v >= high)
    }
}

impl fmt::Display for OutsideFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{0} <= {1} || {0} >= {2}",
            self.field,
            literal(&self.low),
            literal(&self.high)
        )
    }
}

impl Tweakable for OutsideFV {
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        let lows = tweak_field(desc, &self.field, &self.low, stage);
        let highs = tweak_field(desc, &self.field, &self.high, stage);
        range_variants(&self.field, &self.low, &self.high, lows, highs, |f, l, h| {
            OutsideFV::new(f, l, h).map(Rule::OutsideFV)
        })
    }
}

impl DPReducible for OutsideFV {
    fn reduce_dp(&self) -> Vec<Rule> {
        let lows = reduce_dp_points(&self.low);
        let highs = reduce_dp_points(&self.high);
        range_variants(&self.field, &self.low, &self.high, lows, highs, |f, l, h| {
            OutsideFV::new(f, l, h).map(Rule::OutsideFV)
        })
    }
}

impl Overlapping for OutsideFV {
    fn overlaps(&self, other: &Rule) -> bool {
        matches!(other, Rule::OutsideFV(o) if o.field == self.field)
    }
}

// ── Membership ──────────────────────────────────────────────────────

/// `in(field,v1,v2,...)`. Values are kept unique and sorted by string form.
#[derive(Debug, Clone, PartialEq)]
pub struct InFV {
    pub field: String,
    values: Vec<Value>,
}

impl InFV {
    pub fn new(field: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        let field = field.into();
        let values: BTreeMap<String, Value> =
            values.into_iter().map(|v| (v.to_string(), v)).collect();
        if values.is_empty() {
            return Err(RuleError::Construct(format!("in({}) needs values", field)));
        }
        Ok(Self {
            field,
            values: values.into_values().collect(),
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn contains(&self, value: &Value) -> bool {
        let key = value.to_string();
        self.values.iter().any(|v| v.to_string() == key)
    }

    /// Union with another value set on the same field.
    pub fn union(&self, other: &[Value]) -> Result<Self> {
        let mut values = self.values.clone();
        values.extend(other.iter().cloned());
        InFV::new(&self.field, values)
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let v = lookup(self, record, &self.field)?;
        Ok(self.values.iter().any(|x| equal(v, x)))
    }
}

impl fmt::Display for InFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in({}", self.field)?;
        for v in &self.values {
            write!(f, ",{}", literal(v))?;
        }
        f.write_str(")")
    }
}

impl Overlapping for InFV {
    fn overlaps(&self, other: &Rule) -> bool {
        match other {
            Rule::InFV(o) if o.field == self.field => o.values.iter().any(|v| self.contains(v)),
            _ => false,
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn pivot(rule: &dyn fmt::Display, field: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| RuleError::IncompatibleTypes {
        rule: rule.to_string(),
        field: field.to_string(),
    })
}

fn check_range(field: &str, low: &Value, high: &Value, what: &str) -> Result<()> {
    match (low.as_f64(), high.as_f64()) {
        (Some(l), Some(h)) if h > l => Ok(()),
        _ => Err(RuleError::Construct(format!(
            "{} {}: high ({}) must be greater than low ({})",
            what, field, high, low
        ))),
    }
}

fn tweak_field(desc: &Description, field: &str, value: &Value, stage: usize) -> Vec<Value> {
    let (Some(fd), Some(x)) = (desc.field(field), value.as_f64()) else {
        return Vec::new();
    };
    match fd.bounds() {
        Some((min, max)) => tweak_points(x, min, max, fd.max_dp, stage),
        None => Vec::new(),
    }
}

/// Variants moving one end of a range at a time; invalid ranges are
/// skipped.
fn range_variants(
    field: &str,
    low: &Value,
    high: &Value,
    lows: Vec<Value>,
    highs: Vec<Value>,
    make: impl Fn(&str, Value, Value) -> Result<Rule>,
) -> Vec<Rule> {
    let moved_low = lows.into_iter().map(|l| make(field, l, high.clone()));
    let moved_high = highs.into_iter().map(|h| make(field, low.clone(), h));
    moved_low.chain(moved_high).filter_map(|r| r.ok()).collect()
}
