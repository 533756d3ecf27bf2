use std::fmt;

use rulehunter_core::{Description, Record, Value};

use super::error::{Result, RuleError};
use super::points::{reduce_dp_points, tweak_points};
use super::{lookup_number, DPReducible, Rule, RuleKind, Tweakable, Valued};
use crate::expr::literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArithOp {
    Add,
    Mul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    Le,
    Ge,
}

/// Two fields combined arithmetically and compared with a value, e.g.
/// `a + b <= 10`. Fields are kept in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithFV {
    pub op: ArithOp,
    pub a: String,
    pub b: String,
    pub bound: Bound,
    pub value: Value,
}

impl ArithFV {
    pub fn new(
        op: ArithOp,
        a: impl Into<String>,
        b: impl Into<String>,
        bound: Bound,
        value: Value,
    ) -> Result<Self> {
        let (a, b) = (a.into(), b.into());
        if a == b {
            return Err(RuleError::Construct(format!(
                "arithmetic rule needs two different fields: {}",
                a
            )));
        }
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self {
            op,
            a,
            b,
            bound,
            value,
        })
    }

    pub(crate) fn kind(&self) -> RuleKind {
        match (self.op, self.bound) {
            (ArithOp::Add, Bound::Le) => RuleKind::AddLeF,
            (ArithOp::Add, Bound::Ge) => RuleKind::AddGeF,
            (ArithOp::Mul, Bound::Le) => RuleKind::MulLeF,
            (ArithOp::Mul, Bound::Ge) => RuleKind::MulGeF,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let x = lookup_number(self, record, &self.a)?;
        let y = lookup_number(self, record, &self.b)?;
        let v = self.value.as_f64().ok_or_else(|| RuleError::IncompatibleTypes {
            rule: self.to_string(),
            field: self.a.clone(),
        })?;
        let combined = match self.op {
            ArithOp::Add => x + y,
            ArithOp::Mul => x * y,
        };
        Ok(match self.bound {
            Bound::Le => combined <= v,
            Bound::Ge => combined >= v,
        })
    }

    /// `(min, max, dp)` of the combined value over the described dataset.
    pub fn range(op: ArithOp, desc: &Description, a: &str, b: &str) -> Option<(f64, f64, usize)> {
        let fa = desc.field(a)?;
        let fb = desc.field(b)?;
        let (amin, amax) = fa.bounds()?;
        let (bmin, bmax) = fb.bounds()?;
        match op {
            ArithOp::Add => Some((amin + bmin, amax + bmax, fa.max_dp.max(fb.max_dp))),
            ArithOp::Mul => {
                let products = [amin * bmin, amin * bmax, amax * bmin, amax * bmax];
                let min = products.iter().copied().fold(f64::INFINITY, f64::min);
                let max = products.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some((min, max, fa.max_dp + fb.max_dp))
            }
        }
    }

    fn with_value(&self, value: Value) -> Rule {
        Rule::Arith(ArithFV {
            value,
            ..self.clone()
        })
    }
}

impl fmt::Display for ArithFV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            ArithOp::Add => "+",
            ArithOp::Mul => "*",
        };
        let bound = match self.bound {
            Bound::Le => "<=",
            Bound::Ge => ">=",
        };
        write!(f, "{} {} {} {} {}", self.a, op, self.b, bound, literal(&self.value))
    }
}

impl Valued for ArithFV {
    fn value(&self) -> &Value {
        &self.value
    }
}

impl Tweakable for ArithFV {
    fn tweak(&self, desc: &Description, stage: usize) -> Vec<Rule> {
        let (Some((min, max, dp)), Some(x)) =
            (ArithFV::range(self.op, desc, &self.a, &self.b), self.value.as_f64())
        else {
            return Vec::new();
        };
        tweak_points(x, min, max, dp, stage)
            .into_iter()
            .map(|v| self.with_value(v))
            .collect()
    }
}

impl DPReducible for ArithFV {
    fn reduce_dp(&self) -> Vec<Rule> {
        reduce_dp_points(&self.value)
            .into_iter()
            .map(|v| self.with_value(v))
            .collect()
    }
}
