use std::cmp::Ordering;
use std::fmt;

use rulehunter_core::Record;

use super::error::{Result, RuleError};
use super::{lookup, RuleKind};
use crate::expr::equal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    pub(crate) fn kind(self) -> RuleKind {
        match self {
            CompareOp::Eq => RuleKind::EqFF,
            CompareOp::Ne => RuleKind::NeFF,
            CompareOp::Ge => RuleKind::GeFF,
            CompareOp::Le => RuleKind::LeFF,
            CompareOp::Gt => RuleKind::GtFF,
            CompareOp::Lt => RuleKind::LtFF,
        }
    }
}

/// Compares two fields of the same record, e.g. `a >= b`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldField {
    pub op: CompareOp,
    pub a: String,
    pub b: String,
}

impl FieldField {
    pub fn new(op: CompareOp, a: impl Into<String>, b: impl Into<String>) -> Result<Self> {
        let (a, b) = (a.into(), b.into());
        if a == b {
            return Err(RuleError::Construct(format!(
                "can't compare field with itself: {}",
                a
            )));
        }
        Ok(Self { op, a, b })
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let va = lookup(self, record, &self.a)?;
        let vb = lookup(self, record, &self.b)?;
        match self.op {
            CompareOp::Eq => Ok(equal(va, vb)),
            CompareOp::Ne => Ok(!equal(va, vb)),
            op => {
                let x = va.as_f64().ok_or_else(|| self.incompatible(&self.a))?;
                let y = vb.as_f64().ok_or_else(|| self.incompatible(&self.b))?;
                let ord = x.partial_cmp(&y).ok_or_else(|| self.incompatible(&self.a))?;
                Ok(match op {
                    CompareOp::Ge => ord != Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    _ => ord == Ordering::Less,
                })
            }
        }
    }

    fn incompatible(&self, field: &str) -> RuleError {
        RuleError::IncompatibleTypes {
            rule: self.to_string(),
            field: field.to_string(),
        }
    }
}

impl fmt::Display for FieldField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.a, self.op.symbol(), self.b)
    }
}
