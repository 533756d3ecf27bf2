use std::fmt;

use rulehunter_core::{Record, Value};

use super::error::{Result, RuleError};
use super::{lookup, RuleKind};
use crate::expr::{equal, literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CountCmp {
    Lt,
    Ne,
}

/// How many of `fields` equal `value`, compared with `n`:
/// `count("x",a,b) < 2`. Fields are kept in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct CountVF {
    pub value: Value,
    pub fields: Vec<String>,
    pub cmp: CountCmp,
    pub n: i64,
}

impl CountVF {
    pub fn new(value: Value, mut fields: Vec<String>, cmp: CountCmp, n: i64) -> Result<Self> {
        fields.sort();
        fields.dedup();
        if fields.len() < 2 {
            return Err(RuleError::Construct(
                "count rule needs at least two fields".to_string(),
            ));
        }
        Ok(Self {
            value,
            fields,
            cmp,
            n,
        })
    }

    pub(crate) fn kind(&self) -> RuleKind {
        match self.cmp {
            CountCmp::Lt => RuleKind::CountLtVF,
            CountCmp::Ne => RuleKind::CountNeVF,
        }
    }

    pub fn is_true(&self, record: &Record) -> Result<bool> {
        let mut count = 0;
        for field in &self.fields {
            if equal(lookup(self, record, field)?, &self.value) {
                count += 1;
            }
        }
        Ok(match self.cmp {
            CountCmp::Lt => count < self.n,
            CountCmp::Ne => count != self.n,
        })
    }
}

impl fmt::Display for CountVF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count({}", literal(&self.value))?;
        for field in &self.fields {
            write!(f, ",{}", field)?;
        }
        let cmp = match self.cmp {
            CountCmp::Lt => "<",
            CountCmp::Ne => "!=",
        };
        write!(f, ") {} {}", cmp, self.n)
    }
}
