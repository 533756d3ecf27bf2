//! Small call-by-value expression language used by dynamic rules, goals,
//! `calc` aggregators and when-predicates.
//!
//! Supports `+ - * / %`, comparisons, `&& || !`, parentheses, number,
//! string and bool literals, variables and a fixed function table
//! (`roundto`, `min`, `max`, `abs`, `sqrt`, `pow`, `in`, `ni`, `count`,
//! `true`, `false`). Expressions are compiled once and evaluated many times.

mod error;
mod eval;
mod functions;
mod lexer;
mod parser;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use indexmap::IndexMap;
use rulehunter_core::Value;
use serde::{Deserialize, Serialize};

pub use error::{ExprError, ExprErrorKind};

use parser::Node;

/// Variable lookup for evaluation.
pub trait Vars {
    fn var(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Vars for IndexMap<String, Value, S> {
    fn var(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<S: BuildHasher> Vars for HashMap<String, Value, S> {
    fn var(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Vars for BTreeMap<String, Value> {
    fn var(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// A compiled expression. Equality and display use the source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expr {
    src: String,
    node: Node,
}

impl Expr {
    pub fn compile(src: &str) -> Result<Self, ExprError> {
        let src = src.trim();
        let node = lexer::tokenize(src)
            .and_then(parser::parse)
            .map_err(|kind| ExprError::new(src, kind))?;
        Ok(Self {
            src: src.to_string(),
            node,
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn eval(&self, vars: &dyn Vars) -> Result<Value, ExprError> {
        eval::eval(&self.node, vars).map_err(|kind| ExprError::new(&self.src, kind))
    }

    /// Evaluate to a bool. Text such as `"true"` read from a dataset counts.
    pub fn eval_bool(&self, vars: &dyn Vars) -> Result<bool, ExprError> {
        self.eval(vars)?
            .as_bool()
            .ok_or_else(|| ExprError::new(&self.src, ExprErrorKind::NotBool))
    }

    /// Variables referenced, in order of first appearance.
    pub fn vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.node.collect_vars(&mut out);
        out
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.src)
    }
}

impl TryFrom<String> for Expr {
    type Error = ExprError;

    fn try_from(src: String) -> Result<Self, Self::Error> {
        Expr::compile(&src)
    }
}

impl From<Expr> for String {
    fn from(expr: Expr) -> Self {
        expr.src
    }
}

/// Equality used throughout rules and expressions: numeric when both sides
/// are numbers, otherwise by canonical string.
pub fn equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

/// Render a value as an expression literal: numbers bare, everything else
/// as a quoted string.
pub fn literal(v: &Value) -> String {
    match v {
        Value::Int(_) | Value::Float(_) => v.to_string(),
        Value::Bool(b) => format!("{}", b),
        _ => {
            let s = v.to_string();
            if v.is_number() {
                return s;
            }
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
    }
}
