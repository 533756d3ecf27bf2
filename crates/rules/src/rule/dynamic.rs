use std::fmt;

use rulehunter_core::Record;

use super::error::{Result, RuleError};
use crate::expr::{Expr, ExprErrorKind};

/// A rule written as an expression over the record's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRule {
    expr: Expr,
}

impl DynamicRule {
    pub fn new(src: &str) -> Result<Self> {
        Ok(Self {
            expr: Expr::compile(src)?,
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn fields(&self) -> Vec<String> {
        self.expr.vars()
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        self.expr.eval_bool(record).map_err(|e| match e.kind {
            ExprErrorKind::VarNotExist(field) => RuleError::InvalidRule {
                rule: self.to_string(),
                field,
            },
            ExprErrorKind::IncompatibleTypes => RuleError::IncompatibleTypes {
                rule: self.to_string(),
                field: self.fields().join(","),
            },
            _ => RuleError::Expr(e),
        })
    }
}

impl fmt::Display for DynamicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expr.src())
    }
}
